use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::info;

use crate::error::{Result, TileError};
use crate::transform::ecef::identity_transform;
use crate::types::BoundingRegion;

use super::batch_table::HIERARCHY_EXTENSION;

/// File name of the single tile content, relative to tileset.json.
pub const TILE_CONTENT_URI: &str = "tile.b3dm";

/// Everything the single-tile tileset.json needs.
#[derive(Debug, Clone)]
pub struct TilesetDescription {
    pub region: BoundingRegion,
    pub geometric_error: f64,
    pub content_uri: String,
    /// Root tile transform; omitted when `None` or identity.
    pub transform: Option<[f64; 16]>,
    /// Declare the batch-table hierarchy extension as used and required.
    pub hierarchy_extension: bool,
}

/// Build the tileset.json as a serde_json::Value.
pub fn build_tileset_json(desc: &TilesetDescription) -> serde_json::Value {
    let mut root_tile = json!({
        "boundingVolume": {
            "region": desc.region.to_array()
        },
        "geometricError": 0.0,
        "refine": "ADD",
        "content": {
            "uri": desc.content_uri
        }
    });

    if let Some(t) = desc.transform.filter(|t| *t != identity_transform()) {
        root_tile["transform"] = json!(t);
    }

    let mut tileset = json!({
        "asset": {
            "version": "1.0",
            "generator": "tile-assembler"
        },
        "geometricError": desc.geometric_error,
        "root": root_tile
    });

    if desc.hierarchy_extension {
        tileset["extensionsUsed"] = json!([HIERARCHY_EXTENSION]);
        tileset["extensionsRequired"] = json!([HIERARCHY_EXTENSION]);
    }

    tileset
}

/// Write the tileset.json to disk and return its path.
pub fn write_tileset(desc: &TilesetDescription, out_dir: &Path, pretty: bool) -> Result<PathBuf> {
    let tileset_json = build_tileset_json(desc);

    let tileset_path = out_dir.join("tileset.json");
    let json_string = if pretty {
        serde_json::to_string_pretty(&tileset_json)
    } else {
        serde_json::to_string(&tileset_json)
    }
    .map_err(|e| TileError::Output(format!("Failed to serialize tileset.json: {e}")))?;

    fs::write(&tileset_path, &json_string)
        .map_err(|e| TileError::Output(format!("Failed to write tileset.json: {e}")))?;

    info!(
        path = %tileset_path.display(),
        content = %desc.content_uri,
        "Wrote tileset.json"
    );

    Ok(tileset_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> TilesetDescription {
        TilesetDescription {
            region: BoundingRegion::from_degrees(4.45, 51.88, 4.50, 51.93, 0.0, 100.0),
            geometric_error: 100.0,
            content_uri: TILE_CONTENT_URI.into(),
            transform: None,
            hierarchy_extension: true,
        }
    }

    #[test]
    fn tileset_json_fields() {
        let tileset = build_tileset_json(&description());

        assert_eq!(tileset["asset"]["version"], "1.0");
        assert_eq!(tileset["geometricError"], 100.0);
        assert_eq!(tileset["root"]["refine"], "ADD");
        assert_eq!(tileset["root"]["geometricError"], 0.0);
        assert_eq!(tileset["root"]["content"]["uri"], "tile.b3dm");
        assert!(tileset["root"].get("transform").is_none());

        let region = tileset["root"]["boundingVolume"]["region"].as_array().unwrap();
        assert_eq!(region.len(), 6);
        assert_eq!(region[0].as_f64().unwrap(), 4.45_f64.to_radians());
        assert_eq!(region[5].as_f64().unwrap(), 100.0);
    }

    #[test]
    fn extension_declared_unless_legacy() {
        let tileset = build_tileset_json(&description());
        assert_eq!(tileset["extensionsUsed"], json!([HIERARCHY_EXTENSION]));
        assert_eq!(tileset["extensionsRequired"], json!([HIERARCHY_EXTENSION]));

        let legacy = TilesetDescription {
            hierarchy_extension: false,
            ..description()
        };
        let tileset = build_tileset_json(&legacy);
        assert!(tileset.get("extensionsUsed").is_none());
        assert!(tileset.get("extensionsRequired").is_none());
    }

    #[test]
    fn tileset_json_has_transform() {
        let transform = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 100.0, 200.0, 300.0,
            1.0,
        ];
        let desc = TilesetDescription {
            transform: Some(transform),
            ..description()
        };
        let tileset = build_tileset_json(&desc);

        let t = tileset["root"]["transform"].as_array().unwrap();
        assert_eq!(t.len(), 16);
        // Check translation column
        assert_eq!(t[12].as_f64().unwrap(), 100.0);
        assert_eq!(t[13].as_f64().unwrap(), 200.0);
        assert_eq!(t[14].as_f64().unwrap(), 300.0);
    }

    #[test]
    fn identity_transform_omitted() {
        let desc = TilesetDescription {
            transform: Some(identity_transform()),
            ..description()
        };
        assert!(build_tileset_json(&desc)["root"].get("transform").is_none());
    }

    #[test]
    fn write_tileset_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_tileset(&description(), tmp.path(), true).unwrap();
        assert_eq!(path, tmp.path().join("tileset.json"));

        let json_str = fs::read_to_string(&path).unwrap();
        assert!(json_str.contains('\n'), "pretty output is multi-line");
        let tileset: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert_eq!(tileset["root"]["content"]["uri"], "tile.b3dm");
    }

    #[test]
    fn compact_output_is_single_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_tileset(&description(), tmp.path(), false).unwrap();
        let json_str = fs::read_to_string(path).unwrap();
        assert!(!json_str.contains('\n'));
    }

    #[test]
    fn missing_directory_is_output_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does/not/exist");
        assert!(matches!(
            write_tileset(&description(), &missing, true),
            Err(TileError::Output(_))
        ));
    }
}
