use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, TileError};
use crate::ingestion::{self, IngestionResult};
use crate::tiling::batch_table::HierarchyLayout;
use crate::tiling::tileset_writer::{self, TilesetDescription, TILE_CONTENT_URI};
use crate::tiling::{self, AssembledTile};
use crate::types::BoundingRegion;

/// Summary of a completed pipeline run.
#[derive(Debug)]
pub struct ProcessingResult {
    /// Features in the written tile; 0 for a dry run.
    pub batch_length: usize,
    pub tile_bytes: usize,
    pub duration: Duration,
}

/// Pipeline orchestrator -- drives ingestion, assembly and output.
pub struct Pipeline;

impl Pipeline {
    /// Run the full assembly pipeline.
    pub fn run(config: &PipelineConfig) -> Result<ProcessingResult> {
        let start = Instant::now();

        info!(input = %config.input.display(), "Starting pipeline");

        info!("Stage 1/3: Ingestion");
        let ingestion_result = ingestion::ingest(config)?;

        if config.dry_run {
            info!("--dry-run: inputs loaded, nothing written");
            print_dry_run_summary(&ingestion_result);
            return Ok(ProcessingResult {
                batch_length: 0,
                tile_bytes: 0,
                duration: start.elapsed(),
            });
        }

        let locations: Vec<[f64; 3]> = ingestion_result
            .placemarks
            .iter()
            .map(|p| p.location())
            .collect();

        info!("Stage 2/3: Assembly");
        if !config.assembly.center {
            warn!("Positions are stored as f32 ECEF (about 0.5 m resolution); pass --center to keep full precision");
        }
        let IngestionResult {
            meshes, instances, ..
        } = ingestion_result;
        let tile = tiling::assemble_tile(meshes, &instances, &config.assembly)?;
        info!(
            batch_length = tile.batch_length,
            vertices = tile.vertex_count,
            bytes = tile.b3dm.len(),
            "Tile assembled"
        );

        info!("Stage 3/3: Output");
        let tile_path = Self::write(config, &tile, &locations)?;

        let duration = start.elapsed();
        info!(
            tile = %tile_path.display(),
            features = tile.batch_length,
            elapsed = ?duration,
            "Pipeline complete"
        );

        Ok(ProcessingResult {
            batch_length: tile.batch_length,
            tile_bytes: tile.b3dm.len(),
            duration,
        })
    }

    fn write(config: &PipelineConfig, tile: &AssembledTile, locations: &[[f64; 3]]) -> Result<PathBuf> {
        fs::create_dir_all(&config.output).map_err(|e| {
            TileError::Output(format!(
                "Failed to create output directory {}: {e}",
                config.output.display()
            ))
        })?;

        let tile_path = config.output.join(TILE_CONTENT_URI);
        fs::write(&tile_path, &tile.b3dm).map_err(|e| {
            TileError::Output(format!("Failed to write {}: {e}", tile_path.display()))
        })?;

        let region = BoundingRegion::around_locations(
            locations,
            config.tileset.region_margin,
            config.tileset.height_extent,
        )
        .ok_or_else(|| TileError::EmptyInput("no placemark locations for the tile region".into()))?;

        let desc = TilesetDescription {
            region,
            geometric_error: config.tileset.geometric_error,
            content_uri: TILE_CONTENT_URI.to_string(),
            transform: None,
            hierarchy_extension: config.assembly.hierarchy_layout == HierarchyLayout::Extension,
        };
        info!(output = %config.output.display(), "Writing tileset");
        tileset_writer::write_tileset(&desc, &config.output, config.tileset.pretty)?;

        Ok(tile_path)
    }
}

/// Print dry-run summary with input stats.
fn print_dry_run_summary(ingestion: &IngestionResult) {
    let stats = &ingestion.stats;
    println!("=== Dry Run Summary ===");
    println!("  Placemarks: {}", stats.total_placemarks);
    println!("  Instances:  {}", stats.total_instances);
    println!("  Meshes:     {}", stats.total_meshes);
    println!("  Vertices:   {}", stats.total_vertices);
    println!("  Triangles:  {}", stats.total_triangles);
    println!("  UVs:        {}", if stats.has_uvs { "yes" } else { "no" });
    println!("  Colors:     {}", if stats.has_colors { "yes" } else { "no" });
    println!("  Textures:   {}", stats.texture_count);
}
