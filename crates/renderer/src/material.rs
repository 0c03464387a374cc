//! GPU material construction and the material arena.
//!
//! A [`GpuMaterial`] owns the textures, parameter uniform buffer, and
//! descriptor set for one material. Optional texture channels that an asset
//! omits are bound to one of five fixed fallback textures so every binding
//! in the set always references a valid image.
//!
//! Materials live in a [`MaterialArena`] and meshes refer to them by a
//! stable [`MaterialHandle`] instead of holding references directly.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use viewer_resources::{AlphaMode, ImageData, MaterialDesc, TextureRef};
use viewer_rhi::buffer::{Buffer, BufferUsage};
use viewer_rhi::command::CommandPool;
use viewer_rhi::descriptor::{buffer_info, image_info, update_descriptor_sets, DescriptorPool};
use viewer_rhi::device::Device;
use viewer_rhi::texture::{FilterMode, Texture};
use viewer_rhi::RhiResult;

use crate::params::MaterialParams;

/// Texture channels a material can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialChannel {
    BaseColor,
    MetallicRoughness,
    Normal,
    Emissive,
    Occlusion,
}

impl MaterialChannel {
    /// Returns the image format for this channel.
    ///
    /// Color-bearing channels are sRGB; data channels stay linear.
    pub fn format(self) -> vk::Format {
        match self {
            Self::BaseColor | Self::Emissive => vk::Format::R8G8B8A8_SRGB,
            Self::MetallicRoughness | Self::Normal | Self::Occlusion => vk::Format::R8G8B8A8_UNORM,
        }
    }
}

/// Returns true when the occlusion channel can share the metallic-roughness
/// texture instead of uploading the same image twice.
pub fn occlusion_aliases_mr(desc: &MaterialDesc) -> bool {
    match (&desc.occlusion_texture, &desc.metallic_roughness_texture) {
        (Some(occlusion), Some(mr)) => occlusion.image_index == mr.image_index,
        _ => false,
    }
}

/// The five fixed 1x1 textures substituted for absent material channels.
pub struct FallbackTextures {
    /// Opaque white, sRGB. Base color fallback.
    pub white_srgb: Texture,
    /// Opaque black, sRGB. Emissive fallback.
    pub black_srgb: Texture,
    /// Flat +Z tangent-space normal, linear.
    pub flat_normal: Texture,
    /// R=occlusion(1), G=roughness(1), B=metallic(0), linear.
    pub default_mr: Texture,
    /// Opaque white, linear. Occlusion fallback.
    pub white_unorm: Texture,
}

impl FallbackTextures {
    /// Uploads all five fallback textures.
    pub fn new(device: Arc<Device>, upload_pool: &CommandPool) -> RhiResult<Self> {
        let white_srgb = Texture::solid_color(
            device.clone(),
            upload_pool,
            [255, 255, 255, 255],
            vk::Format::R8G8B8A8_SRGB,
            FilterMode::Linear,
        )?;
        let black_srgb = Texture::solid_color(
            device.clone(),
            upload_pool,
            [0, 0, 0, 255],
            vk::Format::R8G8B8A8_SRGB,
            FilterMode::Linear,
        )?;
        let flat_normal = Texture::solid_color(
            device.clone(),
            upload_pool,
            [128, 128, 255, 255],
            vk::Format::R8G8B8A8_UNORM,
            FilterMode::Nearest,
        )?;
        let default_mr = Texture::solid_color(
            device.clone(),
            upload_pool,
            [255, 255, 0, 255],
            vk::Format::R8G8B8A8_UNORM,
            FilterMode::Nearest,
        )?;
        let white_unorm = Texture::solid_color(
            device,
            upload_pool,
            [255, 255, 255, 255],
            vk::Format::R8G8B8A8_UNORM,
            FilterMode::Nearest,
        )?;

        debug!("Created fallback textures");

        Ok(Self {
            white_srgb,
            black_srgb,
            flat_normal,
            default_mr,
            white_unorm,
        })
    }

    /// Returns the fallback texture for a channel.
    pub fn for_channel(&self, channel: MaterialChannel) -> &Texture {
        match channel {
            MaterialChannel::BaseColor => &self.white_srgb,
            MaterialChannel::MetallicRoughness => &self.default_mr,
            MaterialChannel::Normal => &self.flat_normal,
            MaterialChannel::Emissive => &self.black_srgb,
            MaterialChannel::Occlusion => &self.white_unorm,
        }
    }
}

/// Descriptor binding slots for the material set.
///
/// The table is walked in order when writing the descriptor set, so every
/// binding is always written exactly once.
const BINDING_TABLE: [(u32, MaterialChannel); 5] = [
    (0, MaterialChannel::BaseColor),
    (1, MaterialChannel::MetallicRoughness),
    (2, MaterialChannel::Normal),
    (3, MaterialChannel::Emissive),
    (5, MaterialChannel::Occlusion),
];

/// Binding index of the material parameter uniform buffer.
const PARAMS_BINDING: u32 = 4;

/// Stable handle into a [`MaterialArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u32);

/// GPU-resident material: channel textures, parameter buffer, descriptor set.
pub struct GpuMaterial {
    base_color: Option<Texture>,
    metallic_roughness: Option<Texture>,
    normal: Option<Texture>,
    emissive: Option<Texture>,
    occlusion: Option<Texture>,
    params_buffer: Buffer,
    descriptor_set: vk::DescriptorSet,
    alpha_mode: AlphaMode,
}

impl GpuMaterial {
    /// Uploads a material's textures and parameters and writes its
    /// descriptor set.
    ///
    /// Channels whose image index does not resolve to a decoded image fall
    /// back to the fixed textures with a warning.
    pub fn new(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        set_layout: vk::DescriptorSetLayout,
        desc: &MaterialDesc,
        images: &[ImageData],
        fallbacks: &FallbackTextures,
    ) -> RhiResult<Self> {
        let base_color = Self::upload_channel(
            &device,
            upload_pool,
            images,
            desc.base_color_texture.as_ref(),
            MaterialChannel::BaseColor,
        )?;
        let metallic_roughness = Self::upload_channel(
            &device,
            upload_pool,
            images,
            desc.metallic_roughness_texture.as_ref(),
            MaterialChannel::MetallicRoughness,
        )?;
        let normal = Self::upload_channel(
            &device,
            upload_pool,
            images,
            desc.normal_texture.as_ref(),
            MaterialChannel::Normal,
        )?;
        let emissive = Self::upload_channel(
            &device,
            upload_pool,
            images,
            desc.emissive_texture.as_ref(),
            MaterialChannel::Emissive,
        )?;

        // Occlusion often lives in the same image as metallic-roughness;
        // alias the already-uploaded texture instead of uploading it twice.
        let occlusion = if occlusion_aliases_mr(desc) {
            metallic_roughness.as_ref().map(Texture::alias)
        } else {
            Self::upload_channel(
                &device,
                upload_pool,
                images,
                desc.occlusion_texture.as_ref(),
                MaterialChannel::Occlusion,
            )?
        };

        let params = MaterialParams::from_desc(desc);
        let params_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Uniform,
            bytemuck::bytes_of(&params),
        )?;

        let descriptor_set = descriptor_pool.allocate(&[set_layout])?[0];

        let material = Self {
            base_color,
            metallic_roughness,
            normal,
            emissive,
            occlusion,
            params_buffer,
            descriptor_set,
            alpha_mode: desc.alpha_mode,
        };
        material.write_descriptor_set(&device, fallbacks);

        debug!(
            name = desc.name.as_deref().unwrap_or("<unnamed>"),
            "Created GPU material"
        );

        Ok(material)
    }

    /// Uploads one texture channel, or returns `None` to use the fallback.
    fn upload_channel(
        device: &Arc<Device>,
        upload_pool: &CommandPool,
        images: &[ImageData],
        texture_ref: Option<&TextureRef>,
        channel: MaterialChannel,
    ) -> RhiResult<Option<Texture>> {
        let Some(texture_ref) = texture_ref else {
            return Ok(None);
        };

        let Some(image) = images.get(texture_ref.image_index) else {
            warn!(
                "Material references image {} but only {} images were decoded, using fallback",
                texture_ref.image_index,
                images.len()
            );
            return Ok(None);
        };

        let texture = Texture::from_pixels(
            device.clone(),
            upload_pool,
            &image.pixels,
            image.width,
            image.height,
            channel.format(),
            FilterMode::Linear,
        )?;
        Ok(Some(texture))
    }

    /// Writes all six bindings of the descriptor set.
    fn write_descriptor_set(&self, device: &Arc<Device>, fallbacks: &FallbackTextures) {
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = BINDING_TABLE
            .iter()
            .map(|&(_, channel)| {
                let texture = self.channel(channel).unwrap_or(fallbacks.for_channel(channel));
                [image_info(
                    texture.sampler(),
                    texture.view(),
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )]
            })
            .collect();

        let buffer_infos = [buffer_info(
            self.params_buffer.handle(),
            0,
            MaterialParams::SIZE as u64,
        )];

        let mut writes: Vec<vk::WriteDescriptorSet> = BINDING_TABLE
            .iter()
            .zip(&image_infos)
            .map(|(&(binding, _), infos)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(self.descriptor_set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(infos)
            })
            .collect();
        writes.push(
            vk::WriteDescriptorSet::default()
                .dst_set(self.descriptor_set)
                .dst_binding(PARAMS_BINDING)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos),
        );

        update_descriptor_sets(device, &writes);
    }

    /// Returns the uploaded texture for a channel, if any.
    pub fn channel(&self, channel: MaterialChannel) -> Option<&Texture> {
        match channel {
            MaterialChannel::BaseColor => self.base_color.as_ref(),
            MaterialChannel::MetallicRoughness => self.metallic_roughness.as_ref(),
            MaterialChannel::Normal => self.normal.as_ref(),
            MaterialChannel::Emissive => self.emissive.as_ref(),
            MaterialChannel::Occlusion => self.occlusion.as_ref(),
        }
    }

    /// Returns the material's descriptor set.
    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Returns the material's alpha mode.
    #[inline]
    pub fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    /// Returns true when this material draws with the blend pipeline.
    #[inline]
    pub fn is_blended(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}

/// Owning store of GPU materials, addressed by [`MaterialHandle`].
#[derive(Default)]
pub struct MaterialArena {
    materials: Vec<GpuMaterial>,
}

impl MaterialArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a material and returns its handle.
    pub fn insert(&mut self, material: GpuMaterial) -> MaterialHandle {
        let handle = MaterialHandle(self.materials.len() as u32);
        self.materials.push(material);
        handle
    }

    /// Looks up a material by handle.
    pub fn get(&self, handle: MaterialHandle) -> Option<&GpuMaterial> {
        self.materials.get(handle.0 as usize)
    }

    /// Number of materials in the arena.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns true when the arena holds no materials.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Iterates over the stored materials.
    pub fn iter(&self) -> impl Iterator<Item = &GpuMaterial> {
        self.materials.iter()
    }

    /// Drops every material.
    pub fn clear(&mut self) {
        self.materials.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_formats() {
        assert_eq!(
            MaterialChannel::BaseColor.format(),
            vk::Format::R8G8B8A8_SRGB
        );
        assert_eq!(MaterialChannel::Emissive.format(), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(
            MaterialChannel::MetallicRoughness.format(),
            vk::Format::R8G8B8A8_UNORM
        );
        assert_eq!(MaterialChannel::Normal.format(), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(
            MaterialChannel::Occlusion.format(),
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_occlusion_aliasing_same_image() {
        let desc = MaterialDesc {
            metallic_roughness_texture: Some(TextureRef { image_index: 3 }),
            occlusion_texture: Some(TextureRef { image_index: 3 }),
            ..Default::default()
        };
        assert!(occlusion_aliases_mr(&desc));
    }

    #[test]
    fn test_occlusion_aliasing_different_image() {
        let desc = MaterialDesc {
            metallic_roughness_texture: Some(TextureRef { image_index: 3 }),
            occlusion_texture: Some(TextureRef { image_index: 4 }),
            ..Default::default()
        };
        assert!(!occlusion_aliases_mr(&desc));
    }

    #[test]
    fn test_occlusion_aliasing_missing_channel() {
        let desc = MaterialDesc {
            occlusion_texture: Some(TextureRef { image_index: 0 }),
            ..Default::default()
        };
        assert!(!occlusion_aliases_mr(&desc));
        assert!(!occlusion_aliases_mr(&MaterialDesc::default()));
    }

    #[test]
    fn test_binding_table_covers_all_slots() {
        let mut bindings: Vec<u32> = BINDING_TABLE.iter().map(|&(b, _)| b).collect();
        bindings.push(PARAMS_BINDING);
        bindings.sort_unstable();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_material_handle_indexing() {
        let arena = MaterialArena::new();
        assert!(arena.is_empty());
        assert!(arena.get(MaterialHandle(0)).is_none());
    }
}
