use gltf_json::material::AlphaMode;
use gltf_json::texture::{MagFilter, MinFilter, WrappingMode};

/// Encoded image bytes as they will be embedded in the tile's GLB.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSource {
    pub name: Option<String>,
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Sampling parameters copied from the source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub mag_filter: Option<MagFilter>,
    pub min_filter: Option<MinFilter>,
    pub wrap_s: WrappingMode,
    pub wrap_t: WrappingMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: WrappingMode::Repeat,
            wrap_t: WrappingMode::Repeat,
        }
    }
}

/// A base-color texture still owned by its material (not yet indexed).
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSource {
    pub image: ImageSource,
    pub sampler: SamplerDesc,
}

/// PBR metallic-roughness material attached to a mesh view.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    /// Base color factor [r, g, b, a].
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub base_color_texture: Option<TextureSource>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: Option<f32>,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: None,
            double_sided: false,
        }
    }
}

impl Material {
    /// Solid-color material; translucent colors blend and render double sided.
    pub fn from_color(base_color: [f32; 4]) -> Self {
        let translucent = base_color[3] < 1.0;
        Self {
            base_color,
            alpha_mode: if translucent {
                AlphaMode::Blend
            } else {
                AlphaMode::Opaque
            },
            double_sided: translucent,
            ..Default::default()
        }
    }

    pub fn is_textured(&self) -> bool {
        self.base_color_texture.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_defaults() {
        let mat = Material::default();
        assert_eq!(mat.base_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(mat.metallic, 0.0);
        assert_eq!(mat.roughness, 1.0);
        assert_eq!(mat.alpha_mode, AlphaMode::Opaque);
        assert!(!mat.double_sided);
        assert!(!mat.is_textured());
    }

    #[test]
    fn translucent_color_blends() {
        let mat = Material::from_color([0.2, 0.4, 0.6, 0.5]);
        assert_eq!(mat.alpha_mode, AlphaMode::Blend);
        assert!(mat.double_sided);

        let mat = Material::from_color([0.2, 0.4, 0.6, 1.0]);
        assert_eq!(mat.alpha_mode, AlphaMode::Opaque);
        assert!(!mat.double_sided);
    }

    #[test]
    fn textured_material() {
        let mat = Material {
            base_color_texture: Some(TextureSource {
                image: ImageSource {
                    name: Some("facade".into()),
                    data: vec![0x89, b'P', b'N', b'G'],
                    mime_type: "image/png".into(),
                },
                sampler: SamplerDesc::default(),
            }),
            ..Default::default()
        };
        assert!(mat.is_textured());
    }
}
