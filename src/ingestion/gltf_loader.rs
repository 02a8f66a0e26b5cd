use std::collections::HashMap;
use std::fs;
use std::path::Path;

use gltf::image::Source;
use gltf::mesh::Mode;
use tracing::{debug, warn};

use crate::error::{Result, TileError};
use crate::types::{ImageSource, Material, MeshView, PlacedMesh, SamplerDesc, TextureSource};

/// Load every triangle primitive of a glTF or GLB asset.
///
/// Each primitive becomes one [`PlacedMesh`] with a single view. Batch id and
/// transform are left at their defaults for the caller to set. Images are
/// kept encoded; they are embedded into the tile as-is.
pub fn load_gltf(path: &Path) -> Result<Vec<PlacedMesh>> {
    let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(|e| {
        TileError::Input(format!("Failed to load glTF {}: {e}", path.display()))
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let buffers = gltf::import_buffers(&document, Some(base_dir), blob).map_err(|e| {
        TileError::Input(format!("Failed to load buffers of {}: {e}", path.display()))
    })?;

    debug!(
        path = %path.display(),
        meshes = document.meshes().len(),
        materials = document.materials().len(),
        images = document.images().len(),
        "Loaded glTF document"
    );

    let mut images: HashMap<usize, ImageSource> = HashMap::new();
    let mut meshes = Vec::new();

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                warn!(mesh = ?mesh.name(), mode = ?primitive.mode(), "Skipping non-triangle primitive");
                continue;
            }
            let mut placed = extract_primitive(&primitive, &buffers).map_err(|e| {
                TileError::InputShape(format!(
                    "{} mesh {} primitive {}: {e}",
                    path.display(),
                    mesh.name().unwrap_or("<unnamed>"),
                    primitive.index()
                ))
            })?;

            let material = convert_material(&primitive.material(), &buffers, base_dir, &mut images)?;
            placed.views = vec![MeshView {
                index_offset: 0,
                index_count: placed.indices.len(),
                material,
            }];
            meshes.push(placed);
        }
    }

    Ok(meshes)
}

/// Extract geometry from a single glTF primitive.
fn extract_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<PlacedMesh> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    // Positions (required)
    let positions: Vec<f32> = reader
        .read_positions()
        .ok_or_else(|| TileError::InputShape("primitive has no POSITION attribute".into()))?
        .flatten()
        .collect();
    let vertex_count = positions.len() / 3;

    // Indices (sequential when the primitive is not indexed)
    let indices: Vec<u32> = match reader.read_indices() {
        Some(iter) => iter.into_u32().collect(),
        None => (0..vertex_count as u32).collect(),
    };

    // Normals (generated when absent)
    let normals: Vec<f32> = match reader.read_normals() {
        Some(iter) => iter.flatten().collect(),
        None => generate_normals(&positions, &indices),
    };

    // UVs (optional, no V-flip needed for glTF)
    let uvs: Vec<f32> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().flatten().collect())
        .unwrap_or_default();

    // Vertex colors (optional)
    let colors: Vec<u8> = reader
        .read_colors(0)
        .map(|iter| iter.into_rgba_u8().flatten().collect())
        .unwrap_or_default();

    Ok(PlacedMesh {
        positions,
        normals,
        uvs,
        colors,
        indices,
        ..Default::default()
    })
}

/// Area-weighted smooth vertex normals.
pub fn generate_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let mut accum = vec![glam::Vec3::ZERO; vertex_count];
    let vertex = |i: u32| {
        let i = i as usize * 3;
        glam::Vec3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    for tri in indices.chunks_exact(3) {
        if tri.iter().any(|&i| i as usize >= vertex_count) {
            continue;
        }
        let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
        // Cross product length is twice the area, giving the weighting
        let n = (b - a).cross(c - a);
        for &i in tri {
            accum[i as usize] += n;
        }
    }

    accum
        .into_iter()
        .flat_map(|n| n.normalize_or_zero().to_array())
        .collect()
}

/// Convert a glTF material to our PBR material type.
fn convert_material(
    material: &gltf::Material<'_>,
    buffers: &[gltf::buffer::Data],
    base_dir: &Path,
    images: &mut HashMap<usize, ImageSource>,
) -> Result<Material> {
    let pbr = material.pbr_metallic_roughness();

    let base_color_texture = match pbr.base_color_texture() {
        Some(info) => {
            let texture = info.texture();
            let image = texture.source();
            let image_source = match images.get(&image.index()) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = read_image(&image, buffers, base_dir)?;
                    images.insert(image.index(), loaded.clone());
                    loaded
                }
            };
            let sampler = texture.sampler();
            Some(TextureSource {
                image: image_source,
                sampler: SamplerDesc {
                    mag_filter: sampler.mag_filter(),
                    min_filter: sampler.min_filter(),
                    wrap_s: sampler.wrap_s(),
                    wrap_t: sampler.wrap_t(),
                },
            })
        }
        None => None,
    };

    Ok(Material {
        name: material.name().map(str::to_string),
        base_color: pbr.base_color_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        base_color_texture,
        alpha_mode: material.alpha_mode(),
        alpha_cutoff: material.alpha_cutoff(),
        double_sided: material.double_sided(),
    })
}

/// Encoded bytes and MIME type of a glTF image.
fn read_image(
    image: &gltf::Image<'_>,
    buffers: &[gltf::buffer::Data],
    base_dir: &Path,
) -> Result<ImageSource> {
    let (data, mime_type) = match image.source() {
        Source::View { view, mime_type } => {
            let buffer = &buffers[view.buffer().index()];
            let start = view.offset();
            let end = start + view.length();
            let bytes = buffer.get(start..end).ok_or_else(|| {
                TileError::Input(format!("Image {} exceeds its buffer", image.index()))
            })?;
            (bytes.to_vec(), mime_type.to_string())
        }
        Source::Uri { uri, mime_type } => {
            if uri.starts_with("data:") {
                return Err(TileError::Input(format!(
                    "Image {}: embedded data URIs are not supported, use a file or buffer view",
                    image.index()
                )));
            }
            let path = base_dir.join(uri);
            let bytes = fs::read(&path).map_err(|e| {
                TileError::Input(format!("Failed to read image {}: {e}", path.display()))
            })?;
            let mime = match mime_type {
                Some(m) => m.to_string(),
                None => mime_from_extension(uri)?.to_string(),
            };
            (bytes, mime)
        }
    };

    Ok(ImageSource {
        name: image.name().map(str::to_string),
        data,
        mime_type,
    })
}

fn mime_from_extension(uri: &str) -> Result<&'static str> {
    let ext = Path::new(uri)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "webp" => Ok("image/webp"),
        "ktx2" => Ok("image/ktx2"),
        _ => Err(TileError::Input(format!(
            "Cannot determine image type of '{uri}'"
        ))),
    }
}
