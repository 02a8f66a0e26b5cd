pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod tiling;
pub mod transform;
pub mod types;

pub use config::{AssemblyOptions, MatchBy, PipelineConfig};
pub use error::{Result, TileError};
pub use pipeline::Pipeline;
pub use tiling::{assemble_tile, AssembledTile};
