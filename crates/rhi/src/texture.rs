//! Sampled textures and the staging upload path.
//!
//! [`Texture`] owns a VkImage, its device memory, an image view, and a
//! sampler. Pixel data is uploaded through a host-visible staging buffer and
//! a one-shot command buffer; the image ends in SHADER_READ_ONLY_OPTIMAL
//! layout.
//!
//! A texture can also be an alias of another texture (occlusion sharing the
//! metallic-roughness image). Aliases hold the same raw handles but are
//! excluded from destruction; the owning texture must outlive them.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{immediate_submit, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory;

/// Whether a texture owns its Vulkan handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOwnership {
    /// The texture created its handles and destroys them on drop.
    Owned,
    /// The texture shares another texture's handles and never destroys them.
    Aliased,
}

/// Sampler magnification/minification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Linear,
    Nearest,
}

impl FilterMode {
    /// Converts to the Vulkan filter.
    pub fn to_vk(self) -> vk::Filter {
        match self {
            FilterMode::Linear => vk::Filter::LINEAR,
            FilterMode::Nearest => vk::Filter::NEAREST,
        }
    }
}

/// A 2D sampled texture in SHADER_READ_ONLY_OPTIMAL layout.
pub struct Texture {
    device: Arc<Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    format: vk::Format,
    extent: vk::Extent2D,
    ownership: TextureOwnership,
}

impl Texture {
    /// Uploads RGBA8 pixel data into a new device-local texture.
    ///
    /// The pixels move through a host-visible staging buffer and a one-shot
    /// command buffer on the graphics queue; the call blocks until the
    /// transfer completes and the staging buffer is dropped before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels` does not match `width * height * 4`
    /// bytes, or if any Vulkan object creation or the upload fails.
    pub fn from_pixels(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: vk::Format,
        filter: FilterMode,
    ) -> RhiResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RhiError::InvalidHandle(format!(
                "texture data is {} bytes, expected {} for {}x{} RGBA8",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };
        let image_memory = match memory::allocate(
            &device,
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        unsafe {
            device.handle().bind_image_memory(image, image_memory, 0)?;
        }

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        let upload = immediate_submit(
            &device,
            upload_pool,
            device.graphics_queue(),
            |cmd| {
                let to_transfer = image_barrier(
                    image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::TRANSFER_WRITE,
                );
                cmd.pipeline_barrier(
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    &[to_transfer],
                );

                let region = vk::BufferImageCopy::default()
                    .buffer_offset(0)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(0)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .image_extent(vk::Extent3D {
                        width,
                        height,
                        depth: 1,
                    });
                cmd.copy_buffer_to_image(
                    staging.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );

                let to_shader = image_barrier(
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::SHADER_READ,
                );
                cmd.pipeline_barrier(
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    &[to_shader],
                );
            },
        );

        // Staging memory can be released once the queue has drained.
        drop(staging);

        if let Err(e) = upload {
            unsafe {
                device.handle().destroy_image(image, None);
                device.handle().free_memory(image_memory, None);
            }
            return Err(e);
        }

        let view = match create_view(&device, image, format) {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.handle().destroy_image(image, None);
                    device.handle().free_memory(image_memory, None);
                }
                return Err(e);
            }
        };

        let sampler = match create_sampler(&device, filter) {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe {
                    device.handle().destroy_image_view(view, None);
                    device.handle().destroy_image(image, None);
                    device.handle().free_memory(image_memory, None);
                }
                return Err(e);
            }
        };

        debug!(
            "Uploaded {}x{} texture, format {:?}, filter {:?}",
            width, height, format, filter
        );

        Ok(Self {
            device,
            image,
            memory: image_memory,
            view,
            sampler,
            format,
            extent,
            ownership: TextureOwnership::Owned,
        })
    }

    /// Creates a 1x1 texture of a single color.
    pub fn solid_color(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        rgba: [u8; 4],
        format: vk::Format,
        filter: FilterMode,
    ) -> RhiResult<Self> {
        Self::from_pixels(device, upload_pool, &rgba, 1, 1, format, filter)
    }

    /// Creates a non-owning alias of this texture.
    ///
    /// The alias shares every raw handle and skips destruction on drop.
    /// The owning texture must stay alive for as long as the alias is used.
    pub fn alias(&self) -> Texture {
        Texture {
            device: self.device.clone(),
            image: self.image,
            memory: self.memory,
            view: self.view,
            sampler: self.sampler,
            format: self.format,
            extent: self.extent,
            ownership: TextureOwnership::Aliased,
        }
    }

    /// Returns the image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the sampler handle.
    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns whether this texture owns its handles.
    #[inline]
    pub fn ownership(&self) -> TextureOwnership {
        self.ownership
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if self.ownership == TextureOwnership::Aliased {
            return;
        }
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
            self.device.handle().free_memory(self.memory, None);
        }
    }
}

fn image_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        )
}

fn create_view(device: &Device, image: vk::Image, format: vk::Format) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = unsafe { device.handle().create_image_view(&view_info, None)? };
    Ok(view)
}

fn create_sampler(device: &Device, filter: FilterMode) -> RhiResult<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter.to_vk())
        .min_filter(filter.to_vk())
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .min_lod(0.0)
        .max_lod(0.0);

    let sampler = unsafe { device.handle().create_sampler(&sampler_info, None)? };
    Ok(sampler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_mode_to_vk() {
        assert_eq!(FilterMode::Linear.to_vk(), vk::Filter::LINEAR);
        assert_eq!(FilterMode::Nearest.to_vk(), vk::Filter::NEAREST);
    }

    #[test]
    fn ownership_states_are_distinct() {
        assert_ne!(TextureOwnership::Owned, TextureOwnership::Aliased);
    }

    #[test]
    fn upload_barrier_layout_transition() {
        let barrier = image_barrier(
            vk::Image::null(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        );
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.subresource_range.layer_count, 1);
    }
}
