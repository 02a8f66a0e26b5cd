pub mod attributes;
pub mod gltf_loader;
pub mod kml;

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{MatchBy, PipelineConfig};
use crate::error::{Result, TileError};
use crate::transform::placement_transform;
use crate::types::{Instance, PlacedMesh, PropertyValue};

use kml::Placemark;

/// Result of the ingestion stage.
#[derive(Debug)]
pub struct IngestionResult {
    /// Placed meshes in placemark order, batch ids and transforms set.
    pub meshes: Vec<PlacedMesh>,
    /// Instances in batch-id order.
    pub instances: Vec<Instance>,
    pub placemarks: Vec<Placemark>,
    pub stats: IngestionStats,
}

/// Statistics about the ingested data.
#[derive(Debug)]
pub struct IngestionStats {
    pub total_placemarks: usize,
    pub total_instances: usize,
    pub total_meshes: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub has_uvs: bool,
    pub has_colors: bool,
    pub texture_count: usize,
}

/// Run the full ingestion stage.
pub fn ingest(config: &PipelineConfig) -> Result<IngestionResult> {
    if !config.input.exists() {
        return Err(TileError::Input(format!(
            "Placemark document not found: {}",
            config.input.display()
        )));
    }

    let placemarks = kml::load_placemarks(&config.input)?;
    info!(placemarks = placemarks.len(), path = %config.input.display(), "Loaded placemarks");

    let instances = match &config.attributes {
        Some(path) => {
            let instances = attributes::load_attributes(path)?;
            info!(instances = instances.len(), path = %path.display(), "Loaded attributes");
            instances
        }
        None => {
            let instances = synthesize_instances(&placemarks, &config.class_name);
            info!(instances = instances.len(), class = %config.class_name, "Synthesized instances from placemarks");
            instances
        }
    };

    let batch_ids = match_batch_ids(&placemarks, &instances, config.match_by)?;

    let loaded: Vec<Vec<PlacedMesh>> = placemarks
        .par_iter()
        .map(|p| gltf_loader::load_gltf(&p.url))
        .collect::<Result<_>>()?;

    let mut meshes = Vec::new();
    for ((placemark, batch_id), asset_meshes) in placemarks.iter().zip(&batch_ids).zip(loaded) {
        let transform = placement_transform(&placemark.placement, config.y_up);
        debug!(
            name = %placemark.name,
            batch_id,
            primitives = asset_meshes.len(),
            "Placed asset"
        );
        meshes.extend(asset_meshes.into_iter().map(|mut mesh| {
            mesh.batch_id = *batch_id;
            mesh.transform = transform;
            mesh
        }));
    }

    let stats = compute_stats(&placemarks, &instances, &meshes);
    debug!(
        vertices = stats.total_vertices,
        triangles = stats.total_triangles,
        meshes = stats.total_meshes,
        "Ingestion stats"
    );

    Ok(IngestionResult {
        meshes,
        instances,
        placemarks,
        stats,
    })
}

/// One instance per placemark: id is the placemark name, the name is also the
/// first property, followed by the placemark's extended data.
pub fn synthesize_instances(placemarks: &[Placemark], class_name: &str) -> Vec<Instance> {
    placemarks
        .iter()
        .map(|p| {
            let mut instance = Instance::new(p.name.clone(), class_name)
                .with_property("name", PropertyValue::Text(p.name.clone()));
            instance
                .properties
                .extend(p.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            instance
        })
        .collect()
}

/// Batch id for each placemark's asset.
///
/// By name, a placemark takes the index of the instance whose id equals its
/// name. By position, placemark `i` is instance `i`.
pub fn match_batch_ids(
    placemarks: &[Placemark],
    instances: &[Instance],
    match_by: MatchBy,
) -> Result<Vec<u32>> {
    let to_batch_id = |index: usize| {
        u32::try_from(index)
            .map_err(|_| TileError::InputShape(format!("batch id {index} exceeds u32")))
    };

    match match_by {
        MatchBy::Name => {
            let by_id: HashMap<&str, usize> = instances
                .iter()
                .enumerate()
                .map(|(i, inst)| (inst.id.as_str(), i))
                .collect();
            placemarks
                .iter()
                .map(|p| {
                    let index = by_id.get(p.name.as_str()).copied().ok_or_else(|| {
                        TileError::InputShape(format!(
                            "placemark '{}' has no matching instance",
                            p.name
                        ))
                    })?;
                    to_batch_id(index)
                })
                .collect()
        }
        MatchBy::Position => placemarks
            .iter()
            .map(|p| {
                if p.id >= instances.len() {
                    return Err(TileError::InputShape(format!(
                        "placemark {} ('{}') has no instance at that position ({} instances)",
                        p.id,
                        p.name,
                        instances.len()
                    )));
                }
                to_batch_id(p.id)
            })
            .collect(),
    }
}

/// Compute summary statistics from the ingested data.
pub fn compute_stats(
    placemarks: &[Placemark],
    instances: &[Instance],
    meshes: &[PlacedMesh],
) -> IngestionStats {
    IngestionStats {
        total_placemarks: placemarks.len(),
        total_instances: instances.len(),
        total_meshes: meshes.len(),
        total_vertices: meshes.iter().map(PlacedMesh::vertex_count).sum(),
        total_triangles: meshes.iter().map(|m| m.indices.len() / 3).sum(),
        has_uvs: meshes.iter().any(PlacedMesh::has_uvs),
        has_colors: meshes.iter().any(PlacedMesh::has_colors),
        texture_count: meshes
            .iter()
            .flat_map(|m| &m.views)
            .filter(|v| v.material.base_color_texture.is_some())
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Placement;
    use crate::types::Properties;
    use std::path::PathBuf;

    fn placemark(id: usize, name: &str) -> Placemark {
        Placemark {
            id,
            name: name.into(),
            url: PathBuf::from(format!("{name}.gltf")),
            placement: Placement::default(),
            properties: Properties::new(),
        }
    }

    #[test]
    fn match_by_name() {
        let placemarks = [placemark(0, "b"), placemark(1, "a")];
        let instances = [Instance::new("a", "Building"), Instance::new("b", "Building")];
        let ids = match_batch_ids(&placemarks, &instances, MatchBy::Name).unwrap();
        assert_eq!(ids, [1, 0]);
    }

    #[test]
    fn match_by_name_missing_instance() {
        let placemarks = [placemark(0, "ghost")];
        let instances = [Instance::new("a", "Building")];
        let err = match_batch_ids(&placemarks, &instances, MatchBy::Name).unwrap_err();
        assert!(matches!(err, TileError::InputShape(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn match_by_position() {
        let placemarks = [placemark(0, "x"), placemark(1, "y")];
        let instances = [Instance::new("a", "A"), Instance::new("b", "B"), Instance::new("c", "C")];
        let ids = match_batch_ids(&placemarks, &instances, MatchBy::Position).unwrap();
        assert_eq!(ids, [0, 1]);
    }

    #[test]
    fn match_by_position_out_of_range() {
        let placemarks = [placemark(0, "x"), placemark(1, "y")];
        let instances = [Instance::new("a", "A")];
        let err = match_batch_ids(&placemarks, &instances, MatchBy::Position).unwrap_err();
        assert!(matches!(err, TileError::InputShape(_)));
    }

    #[test]
    fn synthesized_instances_carry_name_first() {
        let mut p = placemark(0, "Building_A");
        p.properties.insert("height".into(), PropertyValue::Number(12.0));
        let instances = synthesize_instances(&[p], "House");

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "Building_A");
        assert_eq!(instances[0].class_name, "House");
        let keys: Vec<&str> = instances[0].properties.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "height"]);
        assert!(instances[0].parents.is_empty());
    }

    #[test]
    fn compute_stats_basic() {
        let meshes = vec![
            PlacedMesh {
                positions: vec![0.0; 9],
                normals: vec![0.0; 9],
                uvs: vec![0.0; 6],
                indices: vec![0, 1, 2],
                ..Default::default()
            },
            PlacedMesh {
                positions: vec![0.0; 12],
                normals: vec![0.0; 12],
                colors: vec![255; 16],
                indices: vec![0, 1, 2, 0, 2, 3],
                ..Default::default()
            },
        ];
        let stats = compute_stats(&[placemark(0, "a")], &[Instance::new("a", "A")], &meshes);

        assert_eq!(stats.total_placemarks, 1);
        assert_eq!(stats.total_instances, 1);
        assert_eq!(stats.total_meshes, 2);
        assert_eq!(stats.total_vertices, 7);
        assert_eq!(stats.total_triangles, 3);
        assert!(stats.has_uvs);
        assert!(stats.has_colors);
        assert_eq!(stats.texture_count, 0);
    }

    #[test]
    fn ingest_missing_file() {
        let config = PipelineConfig {
            input: PathBuf::from("/nonexistent/config.xml"),
            ..Default::default()
        };
        let err = ingest(&config).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
