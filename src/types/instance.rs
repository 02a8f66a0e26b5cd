use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A scalar batch-table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(_) => None,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

/// Ordered property dictionary; iteration order is insertion order.
pub type Properties = IndexMap<String, PropertyValue>;

/// One feature of the tile, as described by the attribute source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Identity used for asset matching and parent references.
    pub id: String,
    pub class_name: String,
    /// Columns of the flat batch table.
    #[serde(default)]
    pub properties: Properties,
    /// Per-instance values stored under the instance's hierarchy class.
    #[serde(default)]
    pub class_properties: Properties,
    /// Parent instance ids.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl Instance {
    pub fn new(id: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_class_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.class_properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }
}
