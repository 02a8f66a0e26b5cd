use std::borrow::Cow;
use std::collections::BTreeMap;

use bytemuck::Pod;
use gltf::binary::Glb;
use gltf_json::accessor::{ComponentType, GenericComponentType, Type as AccessorType};
use gltf_json::buffer::Target;
use gltf_json::mesh::{Mode, Primitive, Semantic};
use gltf_json::validation::{Checked, USize64};
use gltf_json::Index;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TileError};
use crate::types::{Material, MergedMesh, TextureSource};

use super::padding::{pad_in_place, BINARY_FILL, JSON_FILL, SECTION_ALIGNMENT};

/// Vertex attribute name for batch ids; written with the `_` prefix.
pub const BATCH_ID_ATTRIBUTE: &str = "BATCHID";

/// Models are authored Z-up; glTF is Y-up. Column-major.
#[rustfmt::skip]
const Z_UP_TO_Y_UP: [f32; 16] = [
    1.0, 0.0,  0.0, 0.0,
    0.0, 0.0, -1.0, 0.0,
    0.0, 1.0,  0.0, 0.0,
    0.0, 0.0,  0.0, 1.0,
];

/// GLB header (12 bytes) plus the JSON chunk header (8 bytes).
const GLB_JSON_CHUNK_START: usize = 20;

/// The mesh document plus the single binary buffer it describes.
#[derive(Debug)]
pub struct GltfDocument {
    pub root: gltf_json::Root,
    /// Padded vertex region, index region, then embedded images.
    pub buffer: Vec<u8>,
}

impl GltfDocument {
    /// Pack the document and buffer into a binary glTF container.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let json_string = gltf_json::serialize::to_string(&self.root)
            .map_err(|e| TileError::Output(format!("Failed to serialize glTF JSON: {e}")))?;
        let mut json_bytes = json_string.into_bytes();
        // The binary chunk is already 8-aligned, so padding the JSON chunk
        // past the 20 header bytes keeps the whole GLB a multiple of 8.
        pad_in_place(&mut json_bytes, GLB_JSON_CHUNK_START, SECTION_ALIGNMENT, JSON_FILL);

        let bin_len = if self.buffer.is_empty() {
            0
        } else {
            8 + self.buffer.len()
        };
        let glb = Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: (GLB_JSON_CHUNK_START + json_bytes.len() + bin_len) as u32,
            },
            json: Cow::Owned(json_bytes),
            bin: if self.buffer.is_empty() {
                None
            } else {
                Some(Cow::Borrowed(self.buffer.as_slice()))
            },
        };

        glb.to_vec()
            .map_err(|e| TileError::Output(format!("Failed to write GLB: {e}")))
    }
}

/// Serialize a merged mesh straight to GLB bytes.
pub fn write_glb(mesh: &MergedMesh, use_batch_ids: bool) -> Result<Vec<u8>> {
    build_gltf(mesh, use_batch_ids)?.to_glb()
}

/// Lay out the merged mesh into one buffer and describe it.
///
/// Vertex region, in order: positions, normals, uvs, colors (if any),
/// batch ids (if requested), padded to 8 bytes. The u16 index region starts
/// at the padded end of the vertex region. Each view gets its own index
/// accessor and material; base-color images are embedded after the index
/// region and share the first sampler seen.
pub fn build_gltf(mesh: &MergedMesh, use_batch_ids: bool) -> Result<GltfDocument> {
    let mut root = gltf_json::Root {
        asset: gltf_json::Asset {
            version: "2.0".into(),
            generator: Some("tile-assembler".into()),
            ..Default::default()
        },
        ..Default::default()
    };

    if mesh.is_empty() {
        push_scene(&mut root, None);
        return Ok(GltfDocument {
            root,
            buffer: Vec::new(),
        });
    }

    let vertex_count = mesh.vertex_count();
    if vertex_count > super::merger::MAX_VERTICES {
        return Err(TileError::InputShape(format!(
            "{vertex_count} vertices cannot be addressed by u16 indices"
        )));
    }
    let use_batch_ids = use_batch_ids && mesh.has_batch_ids();

    let mut bin: Vec<u8> = Vec::new();
    let buffer_idx = Index::new(0);

    // --- Vertex region ---
    let pos_view = push_view(
        &mut root,
        &mut bin,
        buffer_idx,
        bytemuck::cast_slice(&mesh.positions),
        Some(Target::ArrayBuffer),
    );
    let normals_view = push_view(
        &mut root,
        &mut bin,
        buffer_idx,
        bytemuck::cast_slice(&mesh.normals),
        Some(Target::ArrayBuffer),
    );
    let uvs_view = push_view(
        &mut root,
        &mut bin,
        buffer_idx,
        bytemuck::cast_slice(&mesh.uvs),
        Some(Target::ArrayBuffer),
    );
    let colors_view = mesh.has_colors().then(|| {
        push_view(
            &mut root,
            &mut bin,
            buffer_idx,
            &mesh.colors,
            Some(Target::ArrayBuffer),
        )
    });
    let batch_ids: Vec<f32> = if use_batch_ids {
        mesh.batch_ids.iter().map(|&b| b as f32).collect()
    } else {
        Vec::new()
    };
    let batch_ids_view = use_batch_ids.then(|| {
        push_view(
            &mut root,
            &mut bin,
            buffer_idx,
            bytemuck::cast_slice(&batch_ids),
            Some(Target::ArrayBuffer),
        )
    });

    pad_in_place(&mut bin, 0, SECTION_ALIGNMENT, BINARY_FILL);
    let vertex_region_len = bin.len();

    // --- Index region ---
    let idx_u16: Vec<u16> = mesh.indices.iter().map(|&i| i as u16).collect();
    let idx_view = push_view(
        &mut root,
        &mut bin,
        buffer_idx,
        bytemuck::cast_slice(&idx_u16),
        Some(Target::ElementArrayBuffer),
    );
    pad_in_place(&mut bin, 0, SECTION_ALIGNMENT, BINARY_FILL);

    // --- Vertex accessors ---
    let pos_accessor = root.push(vertex_accessor(
        pos_view,
        vertex_count,
        ComponentType::F32,
        AccessorType::Vec3,
        &mesh.positions,
        false,
    ));
    let normals_accessor = root.push(vertex_accessor(
        normals_view,
        vertex_count,
        ComponentType::F32,
        AccessorType::Vec3,
        &mesh.normals,
        false,
    ));
    let uvs_accessor = root.push(vertex_accessor(
        uvs_view,
        vertex_count,
        ComponentType::F32,
        AccessorType::Vec2,
        &mesh.uvs,
        false,
    ));
    let colors_accessor = colors_view.map(|view| {
        root.push(vertex_accessor(
            view,
            vertex_count,
            ComponentType::U8,
            AccessorType::Vec4,
            &mesh.colors,
            true,
        ))
    });
    let batch_ids_accessor = batch_ids_view.map(|view| {
        root.push(vertex_accessor(
            view,
            vertex_count,
            ComponentType::F32,
            AccessorType::Scalar,
            &batch_ids,
            false,
        ))
    });

    // --- Per-view primitives ---
    let mut textures = TextureCollector::default();
    let mut primitives = Vec::with_capacity(mesh.views.len());

    for view in mesh.views.iter().filter(|v| v.index_count > 0) {
        let end = view.index_offset + view.index_count;
        let slice = mesh.indices.get(view.index_offset..end).ok_or_else(|| {
            TileError::InputShape(format!(
                "view index range {}..{end} exceeds {} indices",
                view.index_offset,
                mesh.indices.len()
            ))
        })?;
        let (min, max) = bounds_json(slice, 1);

        let idx_accessor = root.push(gltf_json::Accessor {
            buffer_view: Some(idx_view),
            byte_offset: Some(USize64::from(view.index_offset * 2)),
            count: USize64::from(view.index_count),
            component_type: Checked::Valid(GenericComponentType(ComponentType::U16)),
            type_: Checked::Valid(AccessorType::Scalar),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), pos_accessor);
        attributes.insert(Checked::Valid(Semantic::Normals), normals_accessor);
        if view.material.is_textured() {
            attributes.insert(Checked::Valid(Semantic::TexCoords(0)), uvs_accessor);
        }
        if let Some(accessor) = colors_accessor {
            attributes.insert(Checked::Valid(Semantic::Colors(0)), accessor);
        }
        if let Some(accessor) = batch_ids_accessor {
            attributes.insert(
                Checked::Valid(Semantic::Extras(BATCH_ID_ATTRIBUTE.into())),
                accessor,
            );
        }

        let texture_index = view
            .material
            .base_color_texture
            .as_ref()
            .map(|tex| textures.push(&mut root, &mut bin, buffer_idx, tex));
        let material_index = root.push(build_material(&view.material, texture_index));

        primitives.push(Primitive {
            attributes,
            indices: Some(idx_accessor),
            material: Some(material_index),
            mode: Checked::Valid(Mode::Triangles),
            targets: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    // --- Mesh / node / scene ---
    let mesh_idx = if primitives.is_empty() {
        None
    } else {
        Some(root.push(gltf_json::Mesh {
            primitives,
            weights: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        }))
    };
    push_scene(&mut root, mesh_idx);

    pad_in_place(&mut bin, 0, SECTION_ALIGNMENT, BINARY_FILL);
    root.push(gltf_json::Buffer {
        byte_length: USize64::from(bin.len()),
        uri: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    debug!(
        vertices = vertex_count,
        views = mesh.views.len(),
        images = textures.image_count,
        vertex_bytes = vertex_region_len,
        total_bytes = bin.len(),
        "Built glTF buffer"
    );

    Ok(GltfDocument { root, buffer: bin })
}

/// Root node carrying the up-axis matrix, referenced by the only scene.
fn push_scene(root: &mut gltf_json::Root, mesh: Option<Index<gltf_json::Mesh>>) {
    let node_idx = root.push(gltf_json::Node {
        matrix: Some(Z_UP_TO_Y_UP),
        mesh,
        name: Some("rootNode".into()),
        ..Default::default()
    });
    let scene_idx = root.push(gltf_json::Scene {
        nodes: vec![node_idx],
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene_idx);
}

/// Append `bytes` to the buffer and describe them with a buffer view.
fn push_view(
    root: &mut gltf_json::Root,
    bin: &mut Vec<u8>,
    buffer_idx: Index<gltf_json::Buffer>,
    bytes: &[u8],
    target: Option<Target>,
) -> Index<gltf_json::buffer::View> {
    let byte_offset = bin.len();
    bin.extend_from_slice(bytes);

    root.push(gltf_json::buffer::View {
        buffer: buffer_idx,
        byte_length: USize64::from(bytes.len()),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        name: None,
        target: target.map(Checked::Valid),
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn vertex_accessor<T: Pod + PartialOrd + Serialize>(
    view: Index<gltf_json::buffer::View>,
    count: usize,
    component_type: ComponentType,
    type_: AccessorType,
    values: &[T],
    normalized: bool,
) -> gltf_json::Accessor {
    let (min, max) = bounds_json(values, type_.multiplicity());
    gltf_json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Checked::Valid(GenericComponentType(component_type)),
        type_: Checked::Valid(type_),
        min,
        max,
        name: None,
        normalized,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Collects embedded images, their textures and the single shared sampler.
#[derive(Default)]
struct TextureCollector {
    sampler: Option<Index<gltf_json::texture::Sampler>>,
    image_count: usize,
}

impl TextureCollector {
    /// Embed the image and add a texture for it. Images are not deduplicated.
    fn push(
        &mut self,
        root: &mut gltf_json::Root,
        bin: &mut Vec<u8>,
        buffer_idx: Index<gltf_json::Buffer>,
        tex: &TextureSource,
    ) -> Index<gltf_json::Texture> {
        pad_in_place(bin, 0, SECTION_ALIGNMENT, BINARY_FILL);
        let view = push_view(root, bin, buffer_idx, &tex.image.data, None);

        let image_idx = root.push(gltf_json::Image {
            buffer_view: Some(view),
            mime_type: Some(gltf_json::image::MimeType(tex.image.mime_type.clone())),
            uri: None,
            name: tex.image.name.clone(),
            extensions: Default::default(),
            extras: Default::default(),
        });
        self.image_count += 1;

        let sampler_idx = *self.sampler.get_or_insert_with(|| {
            root.push(gltf_json::texture::Sampler {
                mag_filter: tex.sampler.mag_filter.map(Checked::Valid),
                min_filter: tex.sampler.min_filter.map(Checked::Valid),
                wrap_s: Checked::Valid(tex.sampler.wrap_s),
                wrap_t: Checked::Valid(tex.sampler.wrap_t),
                name: None,
                extensions: Default::default(),
                extras: Default::default(),
            })
        });

        root.push(gltf_json::Texture {
            sampler: Some(sampler_idx),
            source: image_idx,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        })
    }
}

fn build_material(
    material: &Material,
    texture_index: Option<Index<gltf_json::Texture>>,
) -> gltf_json::Material {
    let base_color_texture = texture_index.map(|idx| gltf_json::texture::Info {
        index: idx,
        tex_coord: 0,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let pbr = gltf_json::material::PbrMetallicRoughness {
        base_color_factor: gltf_json::material::PbrBaseColorFactor(material.base_color),
        metallic_factor: gltf_json::material::StrengthFactor(material.metallic),
        roughness_factor: gltf_json::material::StrengthFactor(material.roughness),
        base_color_texture,
        metallic_roughness_texture: None,
        extensions: Default::default(),
        extras: Default::default(),
    };

    gltf_json::Material {
        pbr_metallic_roughness: pbr,
        alpha_mode: Checked::Valid(material.alpha_mode),
        alpha_cutoff: material.alpha_cutoff.map(gltf_json::material::AlphaCutoff),
        double_sided: material.double_sided,
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: gltf_json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        name: material.name.clone(),
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Component-wise min/max over a flat attribute slice.
///
/// Returns `None` for an empty slice so no infinities are ever emitted.
pub fn component_bounds<T: Copy + PartialOrd>(
    values: &[T],
    components: usize,
) -> Option<(Vec<T>, Vec<T>)> {
    let mut chunks = values.chunks_exact(components);
    let first = chunks.next()?;
    let mut min = first.to_vec();
    let mut max = first.to_vec();

    for chunk in chunks {
        for i in 0..components {
            if chunk[i] < min[i] {
                min[i] = chunk[i];
            }
            if chunk[i] > max[i] {
                max[i] = chunk[i];
            }
        }
    }

    Some((min, max))
}

fn bounds_json<T: Copy + PartialOrd + Serialize>(
    values: &[T],
    components: usize,
) -> (Option<serde_json::Value>, Option<serde_json::Value>) {
    match component_bounds(values, components) {
        Some((min, max)) => (Some(serde_json::json!(min)), Some(serde_json::json!(max))),
        None => (None, None),
    }
}
