pub mod instance;
pub mod material;
pub mod mesh;
pub mod tile;

pub use instance::{Instance, Properties, PropertyValue};
pub use material::{ImageSource, Material, SamplerDesc, TextureSource};
pub use mesh::{MergedMesh, MeshView, PlacedMesh};
pub use tile::BoundingRegion;
