pub mod b3dm;
pub mod batch_table;
pub mod glb_writer;
pub mod merger;
pub mod padding;
pub mod tileset_writer;

use tracing::debug;

use crate::config::AssemblyOptions;
use crate::error::{Result, TileError};
use crate::types::{Instance, PlacedMesh};

use b3dm::FeatureTable;

/// A finished b3dm tile and what the tileset needs to know about it.
#[derive(Debug, Clone)]
pub struct AssembledTile {
    pub b3dm: Vec<u8>,
    /// Number of features (`BATCH_LENGTH`).
    pub batch_length: usize,
    /// Centroid subtracted from positions, when centering was requested.
    pub rtc_center: Option<[f64; 3]>,
    pub vertex_count: usize,
}

/// Assemble one b3dm tile from placed meshes and their instances.
///
/// Meshes are placed, merged in order and written as a GLB with a batch-id
/// attribute. Instance `i` describes batch id `i`. Nothing is returned
/// unless every step succeeds.
pub fn assemble_tile(
    mut meshes: Vec<PlacedMesh>,
    instances: &[Instance],
    options: &AssemblyOptions,
) -> Result<AssembledTile> {
    if instances.is_empty() {
        return Err(TileError::EmptyInput("no instances to assemble".into()));
    }
    if let Some(mesh) = meshes
        .iter()
        .find(|m| m.batch_id as usize >= instances.len())
    {
        return Err(TileError::InputShape(format!(
            "batch id {} has no instance ({} instances)",
            mesh.batch_id,
            instances.len()
        )));
    }

    // Centering is folded into placement so the offset is taken in f64
    let origin = if options.center {
        merger::placed_centroid(&meshes)
    } else {
        [0.0; 3]
    };
    for mesh in &mut meshes {
        merger::place_mesh_about(mesh, origin);
    }
    let mut merged = merger::merge(&meshes)?;
    drop(meshes);

    let rtc_center = options.center.then(|| {
        let residual = merger::recenter(&mut merged);
        [
            origin[0] + residual[0],
            origin[1] + residual[1],
            origin[2] + residual[2],
        ]
    });

    let glb = glb_writer::write_glb(&merged, true)?;

    let table = batch_table::build_batch_table(instances)?;
    let encoded = table.encode(options.hierarchy_layout, options.batch_table_binary)?;

    let feature_table = FeatureTable {
        batch_length: table.batch_length(),
        rtc_center,
    };
    let b3dm = b3dm::pack_b3dm(&feature_table, &encoded.json, &encoded.binary, &glb)?;

    debug!(
        batch_length = feature_table.batch_length,
        vertices = merged.vertex_count(),
        glb_bytes = glb.len(),
        batch_table_binary_bytes = encoded.binary.len(),
        b3dm_bytes = b3dm.len(),
        "Assembled tile"
    );

    Ok(AssembledTile {
        b3dm,
        batch_length: feature_table.batch_length,
        rtc_center,
        vertex_count: merged.vertex_count(),
    })
}
