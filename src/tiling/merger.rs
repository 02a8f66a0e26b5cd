use glam::{DMat4, DVec3};
use tracing::debug;

use crate::error::{Result, TileError};
use crate::types::{MergedMesh, MeshView, PlacedMesh};

/// Highest vertex count for u16 indices.
///
/// Index 65535 is reserved for primitive restart and glTF forbids it in
/// u16 index data, so the largest usable index is 65534.
pub const MAX_VERTICES: usize = u16::MAX as usize;

const DEFAULT_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Apply the mesh's placement transform in place.
///
/// Positions are transformed as points (f64 math, written back as f32),
/// normals as directions and renormalized.
pub fn place_mesh(mesh: &mut PlacedMesh) {
    place_mesh_about(mesh, [0.0; 3]);
}

/// Like [`place_mesh`], but positions are written relative to `origin`.
///
/// The subtraction happens in f64 before narrowing, so positions near a
/// distant origin keep sub-millimetre precision.
pub fn place_mesh_about(mesh: &mut PlacedMesh, origin: [f64; 3]) {
    let matrix = DMat4::from_cols_array(&mesh.transform);
    let origin = DVec3::from_array(origin);

    for p in mesh.positions.chunks_exact_mut(3) {
        let v = matrix.transform_point3(DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
            - origin;
        p[0] = v.x as f32;
        p[1] = v.y as f32;
        p[2] = v.z as f32;
    }

    for n in mesh.normals.chunks_exact_mut(3) {
        let v = matrix
            .transform_vector3(DVec3::new(n[0] as f64, n[1] as f64, n[2] as f64))
            .normalize_or_zero();
        n[0] = v.x as f32;
        n[1] = v.y as f32;
        n[2] = v.z as f32;
    }
}

/// Centroid of every position after placement, in f64.
///
/// Meshes are not modified. Yields the origin when there are no vertices.
pub fn placed_centroid(meshes: &[PlacedMesh]) -> [f64; 3] {
    let mut sum = DVec3::ZERO;
    let mut count = 0usize;
    for mesh in meshes {
        let matrix = DMat4::from_cols_array(&mesh.transform);
        for p in mesh.positions.chunks_exact(3) {
            sum += matrix.transform_point3(DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64));
            count += 1;
        }
    }
    if count == 0 {
        return [0.0; 3];
    }
    (sum / count as f64).to_array()
}

/// Concatenate placed meshes into one batched mesh.
///
/// Output order follows input order exactly. Indices are offset by the
/// running vertex count, view offsets by the running index count, and each
/// mesh's batch id is broadcast over its vertices.
pub fn merge(meshes: &[PlacedMesh]) -> Result<MergedMesh> {
    if meshes.is_empty() {
        return Err(TileError::EmptyInput("no meshes to merge".into()));
    }

    for (i, mesh) in meshes.iter().enumerate() {
        mesh.validate()
            .map_err(|e| TileError::InputShape(format!("mesh {i}: {e}")))?;
    }

    let total_vertices: usize = meshes.iter().map(PlacedMesh::vertex_count).sum();
    if total_vertices > MAX_VERTICES {
        return Err(TileError::InputShape(format!(
            "merged mesh has {total_vertices} vertices, u16 indices allow at most {MAX_VERTICES}"
        )));
    }
    let total_indices: usize = meshes.iter().map(|m| m.indices.len()).sum();
    let use_colors = meshes.iter().any(PlacedMesh::has_colors);

    let mut merged = MergedMesh {
        positions: Vec::with_capacity(total_vertices * 3),
        normals: Vec::with_capacity(total_vertices * 3),
        uvs: Vec::with_capacity(total_vertices * 2),
        colors: Vec::with_capacity(if use_colors { total_vertices * 4 } else { 0 }),
        batch_ids: Vec::with_capacity(total_vertices),
        indices: Vec::with_capacity(total_indices),
        views: Vec::with_capacity(meshes.iter().map(|m| m.views.len()).sum()),
    };

    for mesh in meshes {
        let vertex_offset = merged.vertex_count() as u32;
        let index_offset = merged.indices.len();
        let vertex_count = mesh.vertex_count();

        merged.positions.extend_from_slice(&mesh.positions);
        merged.normals.extend_from_slice(&mesh.normals);

        if mesh.has_uvs() {
            merged.uvs.extend_from_slice(&mesh.uvs);
        } else {
            merged.uvs.resize(merged.uvs.len() + vertex_count * 2, 0.0);
        }

        if use_colors {
            if mesh.has_colors() {
                merged.colors.extend_from_slice(&mesh.colors);
            } else {
                for _ in 0..vertex_count {
                    merged.colors.extend_from_slice(&DEFAULT_COLOR);
                }
            }
        }

        merged
            .batch_ids
            .resize(merged.batch_ids.len() + vertex_count, mesh.batch_id);

        merged
            .indices
            .extend(mesh.indices.iter().map(|&i| i + vertex_offset));

        // Empty views would become zero-count accessors
        merged.views.extend(
            mesh.views
                .iter()
                .filter(|view| view.index_count > 0)
                .map(|view| MeshView {
                    index_offset: view.index_offset + index_offset,
                    index_count: view.index_count,
                    material: view.material.clone(),
                }),
        );
    }

    debug!(
        meshes = meshes.len(),
        vertices = merged.vertex_count(),
        indices = merged.indices.len(),
        views = merged.views.len(),
        colors = use_colors,
        "Merged meshes"
    );

    Ok(merged)
}

/// Subtract the centroid of all positions and return it.
///
/// Accumulates in f64. An empty mesh is left untouched and yields the origin.
pub fn recenter(mesh: &mut MergedMesh) -> [f64; 3] {
    let count = mesh.vertex_count();
    if count == 0 {
        return [0.0; 3];
    }

    let mut sum = [0.0_f64; 3];
    for p in mesh.positions.chunks_exact(3) {
        sum[0] += p[0] as f64;
        sum[1] += p[1] as f64;
        sum[2] += p[2] as f64;
    }
    let centroid = [
        sum[0] / count as f64,
        sum[1] / count as f64,
        sum[2] / count as f64,
    ];

    for p in mesh.positions.chunks_exact_mut(3) {
        p[0] = ((p[0] as f64) - centroid[0]) as f32;
        p[1] = ((p[1] as f64) - centroid[1]) as f32;
        p[2] = ((p[2] as f64) - centroid[2]) as f32;
    }

    centroid
}
