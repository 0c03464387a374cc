//! CPU-side material descriptions decoded from glTF.

/// glTF alpha rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    /// Fully opaque; alpha is ignored.
    #[default]
    Opaque,
    /// Alpha tested against the cutoff.
    Mask,
    /// Alpha blended.
    Blend,
}

/// Reference to a source image in the model's image list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRef {
    /// Index into [`crate::ModelData::images`].
    pub image_index: usize,
}

/// A material as described by the source file.
///
/// Texture channels are optional; absent channels fall back to renderer
/// defaults. Scalar factors carry glTF's defaults when the file omits them.
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub name: Option<String>,

    pub base_color_texture: Option<TextureRef>,
    pub metallic_roughness_texture: Option<TextureRef>,
    pub normal_texture: Option<TextureRef>,
    pub emissive_texture: Option<TextureRef>,
    pub occlusion_texture: Option<TextureRef>,

    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: None,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            emissive_texture: None,
            occlusion_texture: None,
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
        }
    }
}

impl MaterialDesc {
    /// Builds a description from a glTF material.
    pub fn from_gltf(material: &gltf::Material) -> Self {
        let pbr = material.pbr_metallic_roughness();

        Self {
            name: material.name().map(str::to_owned),
            base_color_texture: pbr.base_color_texture().map(|info| TextureRef {
                image_index: info.texture().source().index(),
            }),
            metallic_roughness_texture: pbr.metallic_roughness_texture().map(|info| TextureRef {
                image_index: info.texture().source().index(),
            }),
            normal_texture: material.normal_texture().map(|info| TextureRef {
                image_index: info.texture().source().index(),
            }),
            emissive_texture: material.emissive_texture().map(|info| TextureRef {
                image_index: info.texture().source().index(),
            }),
            occlusion_texture: material.occlusion_texture().map(|info| TextureRef {
                image_index: info.texture().source().index(),
            }),
            base_color_factor: pbr.base_color_factor(),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            emissive_factor: material.emissive_factor(),
            normal_scale: material.normal_texture().map(|n| n.scale()).unwrap_or(1.0),
            occlusion_strength: material
                .occlusion_texture()
                .map(|o| o.strength())
                .unwrap_or(1.0),
            alpha_mode: match material.alpha_mode() {
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
            },
            alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gltf_spec() {
        let desc = MaterialDesc::default();
        assert_eq!(desc.base_color_factor, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(desc.metallic_factor, 1.0);
        assert_eq!(desc.roughness_factor, 1.0);
        assert_eq!(desc.emissive_factor, [0.0, 0.0, 0.0]);
        assert_eq!(desc.normal_scale, 1.0);
        assert_eq!(desc.occlusion_strength, 1.0);
        assert_eq!(desc.alpha_mode, AlphaMode::Opaque);
        assert_eq!(desc.alpha_cutoff, 0.5);
        assert!(desc.base_color_texture.is_none());
    }
}
