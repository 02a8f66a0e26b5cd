use crate::error::{Result, TileError};

use super::material::Material;

/// A contiguous index range drawn with one material.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshView {
    pub index_offset: usize,
    pub index_count: usize,
    pub material: Material,
}

/// One source asset primitive, ready to be placed and merged.
///
/// All buffers are flat `Vec`s so they can be cast straight into the
/// tile's binary buffer with `bytemuck`.
#[derive(Debug, Clone)]
pub struct PlacedMesh {
    /// Interleaved positions: [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Interleaved normals: [nx, ny, nz, ...]
    pub normals: Vec<f32>,
    /// Interleaved UVs: [u, v, u, v, ...] or empty
    pub uvs: Vec<f32>,
    /// Interleaved RGBA8 vertex colors or empty
    pub colors: Vec<u8>,
    /// Triangle indices local to this mesh
    pub indices: Vec<u32>,
    pub views: Vec<MeshView>,
    /// Feature this mesh belongs to.
    pub batch_id: u32,
    /// Column-major 4×4 placement transform.
    pub transform: [f64; 16],
}

impl Default for PlacedMesh {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
            views: Vec::new(),
            batch_id: 0,
            transform: crate::transform::ecef::identity_transform(),
        }
    }
}

impl PlacedMesh {
    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check stream lengths, index ranges and view coverage.
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(TileError::InputShape(format!(
                "positions length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if self.normals.len() != self.positions.len() {
            return Err(TileError::InputShape(format!(
                "normals length {} does not match positions length {}",
                self.normals.len(),
                self.positions.len()
            )));
        }
        if self.has_uvs() && self.uvs.len() != vertex_count * 2 {
            return Err(TileError::InputShape(format!(
                "uvs length {} does not match {vertex_count} vertices",
                self.uvs.len()
            )));
        }
        if self.has_colors() && self.colors.len() != vertex_count * 4 {
            return Err(TileError::InputShape(format!(
                "colors length {} does not match {vertex_count} vertices",
                self.colors.len()
            )));
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(TileError::InputShape(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }

        let mut expected_offset = 0;
        for view in &self.views {
            if view.index_offset != expected_offset {
                return Err(TileError::InputShape(format!(
                    "view starts at index {} but previous view ended at {expected_offset}",
                    view.index_offset
                )));
            }
            expected_offset += view.index_count;
        }
        if expected_offset != self.indices.len() {
            return Err(TileError::InputShape(format!(
                "views cover {expected_offset} indices but mesh has {}",
                self.indices.len()
            )));
        }
        Ok(())
    }
}

/// All placed meshes of a tile concatenated into one batched mesh.
#[derive(Debug, Clone, Default)]
pub struct MergedMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    /// Always one pair per vertex.
    pub uvs: Vec<f32>,
    /// Empty, or one RGBA8 quad per vertex.
    pub colors: Vec<u8>,
    /// One batch id per vertex.
    pub batch_ids: Vec<u32>,
    pub indices: Vec<u32>,
    pub views: Vec<MeshView>,
}

impl MergedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn has_batch_ids(&self) -> bool {
        !self.batch_ids.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
