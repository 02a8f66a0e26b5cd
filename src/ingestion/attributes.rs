use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TileError};
use crate::types::Instance;

/// Attribute document: `{"instances": [...]}` or a bare instance array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AttributeDocument {
    Wrapped { instances: Vec<Instance> },
    Bare(Vec<Instance>),
}

/// Read instances from a JSON attribute document.
pub fn load_attributes(path: &Path) -> Result<Vec<Instance>> {
    let content = fs::read_to_string(path).map_err(|e| {
        TileError::Input(format!("Failed to read {}: {e}", path.display()))
    })?;
    parse_attributes(&content)
}

/// Parse instances in document order. Order is batch-id order.
pub fn parse_attributes(content: &str) -> Result<Vec<Instance>> {
    let document: AttributeDocument = serde_json::from_str(content)
        .map_err(|e| TileError::Input(format!("Invalid attribute document: {e}")))?;
    let instances = match document {
        AttributeDocument::Wrapped { instances } | AttributeDocument::Bare(instances) => instances,
    };

    if instances.is_empty() {
        return Err(TileError::EmptyInput("attribute document has no instances".into()));
    }
    if let Some(pos) = instances.iter().position(|i| i.id.is_empty()) {
        return Err(TileError::InputShape(format!("instance {pos} has an empty id")));
    }

    debug!(instances = instances.len(), "Parsed attribute document");
    Ok(instances)
}
