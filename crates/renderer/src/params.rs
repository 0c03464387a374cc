//! GPU-visible shading parameter blocks.
//!
//! These structures must match the shader-side layouts exactly. All of them
//! use `#[repr(C)]` for predictable memory layout and implement `Pod` and
//! `Zeroable` for safe byte casting into uniform buffers and push constants.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use viewer_resources::{AlphaMode, MaterialDesc};

/// Per-material shading factors, uploaded once into a uniform buffer.
///
/// # Memory Layout
///
/// - Offset 0: emissive factor (xyz) + occlusion strength (w)
/// - Offset 16: base color factor
/// - Offset 32: metallic, roughness, normal scale, alpha cutoff
/// - Offset 48: alpha mode + padding
/// - Offset 64: reserved row
/// - Total size: 80 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct MaterialParams {
    /// Emissive factor in xyz, occlusion strength in w.
    pub emissive_occlusion: Vec4,
    /// Base color multiplier.
    pub base_color_factor: Vec4,
    /// Metallic factor, roughness factor, normal scale, alpha cutoff.
    pub mr_ns_ac: Vec4,
    /// Alpha mode: 0 = opaque, 1 = mask, 2 = blend.
    pub alpha_mode: u32,
    /// Padding for 16-byte alignment.
    pub _pad: [u32; 3],
    /// Reserved for future factors; kept zero.
    pub _reserved: [u32; 4],
}

impl MaterialParams {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the parameter block from a decoded material description.
    ///
    /// Scalars that only make sense alongside a texture (normal scale,
    /// occlusion strength) are applied only when the corresponding texture is
    /// present and the factor is positive; otherwise the neutral value 1.0 is
    /// written so the shader can multiply unconditionally.
    pub fn from_desc(desc: &MaterialDesc) -> Self {
        let normal_scale = if desc.normal_texture.is_some() && desc.normal_scale > 0.0 {
            desc.normal_scale
        } else {
            1.0
        };

        let occlusion_strength =
            if desc.occlusion_texture.is_some() && desc.occlusion_strength > 0.0 {
                desc.occlusion_strength
            } else {
                1.0
            };

        let alpha_cutoff = if desc.alpha_cutoff > 0.0 {
            desc.alpha_cutoff
        } else {
            0.5
        };

        let alpha_mode = match desc.alpha_mode {
            AlphaMode::Opaque => 0,
            AlphaMode::Mask => 1,
            AlphaMode::Blend => 2,
        };

        Self {
            emissive_occlusion: Vec3::from_array(desc.emissive_factor).extend(occlusion_strength),
            base_color_factor: Vec4::from_array(desc.base_color_factor),
            mr_ns_ac: Vec4::new(
                desc.metallic_factor,
                desc.roughness_factor,
                normal_scale,
                alpha_cutoff,
            ),
            alpha_mode,
            _pad: [0; 3],
            _reserved: [0; 4],
        }
    }
}

/// Per-draw push constant block.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view-projection matrix (64 bytes)
/// - Offset 128: light position (16 bytes)
/// - Offset 144: camera position (16 bytes)
/// - Total size: 160 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct PushConstants {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// Combined view-projection matrix.
    pub view_proj: Mat4,
    /// World-space light position (w unused).
    pub light_pos: Vec4,
    /// World-space camera position (w unused).
    pub view_pos: Vec4,
}

impl PushConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates the per-draw block from a model matrix and camera state.
    pub fn new(model: Mat4, view_proj: Mat4, light_pos: Vec3, view_pos: Vec3) -> Self {
        Self {
            model,
            view_proj,
            light_pos: light_pos.extend(1.0),
            view_pos: view_pos.extend(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    use viewer_resources::TextureRef;

    #[test]
    fn test_material_params_size() {
        // 3 Vec4 (48) + u32 + 3 pad (16) + reserved row (16) = 80 bytes
        assert_eq!(MaterialParams::SIZE, 80);
    }

    #[test]
    fn test_material_params_alignment() {
        assert_eq!(std::mem::align_of::<MaterialParams>(), 16);
    }

    #[test]
    fn test_push_constants_size() {
        // 2 Mat4 (128) + 2 Vec4 (32) = 160 bytes
        assert_eq!(PushConstants::SIZE, 160);
    }

    #[test]
    fn test_push_constants_offsets() {
        assert_eq!(offset_of!(PushConstants, model), 0);
        assert_eq!(offset_of!(PushConstants, view_proj), 64);
        assert_eq!(offset_of!(PushConstants, light_pos), 128);
        assert_eq!(offset_of!(PushConstants, view_pos), 144);
    }

    #[test]
    fn test_from_desc_defaults() {
        let desc = MaterialDesc::default();
        let params = MaterialParams::from_desc(&desc);

        assert_eq!(params.base_color_factor, Vec4::ONE);
        assert_eq!(params.mr_ns_ac, Vec4::new(1.0, 1.0, 1.0, 0.5));
        assert_eq!(params.emissive_occlusion, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(params.alpha_mode, 0);
    }

    #[test]
    fn test_from_desc_blend_no_textures() {
        let desc = MaterialDesc {
            base_color_factor: [0.2, 0.4, 0.6, 1.0],
            alpha_mode: AlphaMode::Blend,
            alpha_cutoff: 0.3,
            ..Default::default()
        };
        let params = MaterialParams::from_desc(&desc);

        assert_eq!(params.base_color_factor, Vec4::new(0.2, 0.4, 0.6, 1.0));
        assert_eq!(params.alpha_mode, 2);
        assert_eq!(params.mr_ns_ac.w, 0.3);
    }

    #[test]
    fn test_from_desc_normal_scale_requires_texture() {
        let desc = MaterialDesc {
            normal_scale: 2.0,
            ..Default::default()
        };
        let params = MaterialParams::from_desc(&desc);
        assert_eq!(params.mr_ns_ac.z, 1.0);

        let desc = MaterialDesc {
            normal_texture: Some(TextureRef { image_index: 0 }),
            normal_scale: 2.0,
            ..Default::default()
        };
        let params = MaterialParams::from_desc(&desc);
        assert_eq!(params.mr_ns_ac.z, 2.0);
    }

    #[test]
    fn test_params_pod_cast() {
        let params = MaterialParams::from_desc(&MaterialDesc::default());
        let bytes: &[u8] = bytemuck::bytes_of(&params);
        assert_eq!(bytes.len(), MaterialParams::SIZE);

        let pc = PushConstants::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ONE, Vec3::ZERO);
        let bytes: &[u8] = bytemuck::bytes_of(&pc);
        assert_eq!(bytes.len(), PushConstants::SIZE);
    }
}
