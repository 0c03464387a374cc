//! Material pipeline variants and their shared descriptor machinery.
//!
//! Both pipeline variants use the same shaders, vertex layout, descriptor
//! set layout, and push constant range. The opaque variant culls back faces
//! and relies on depth writes; the blend variant disables culling and
//! enables alpha blending for translucent meshes.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use viewer_rhi::descriptor::{DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout};
use viewer_rhi::device::Device;
use viewer_rhi::pipeline::{
    ColorBlendAttachment, CompareOp, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline,
    PipelineLayout,
};
use viewer_rhi::shader::{Shader, ShaderStage};
use viewer_rhi::vertex::Vertex;
use viewer_rhi::RhiResult;

use crate::depth_buffer::DEFAULT_DEPTH_FORMAT;
use crate::params::PushConstants;

/// Descriptor pool capacity for combined image samplers.
const POOL_SAMPLER_COUNT: u32 = 500;
/// Descriptor pool capacity for uniform buffers.
const POOL_UNIFORM_COUNT: u32 = 100;
/// Descriptor pool capacity in sets, one per material.
const POOL_MAX_SETS: u32 = 100;

/// Everything needed to draw materials: descriptor layout and pool, the
/// shared pipeline layout, and the two pipeline variants.
pub struct MaterialPipelines {
    descriptor_set_layout: ManuallyDrop<DescriptorSetLayout>,
    descriptor_pool: ManuallyDrop<DescriptorPool>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    opaque: ManuallyDrop<Pipeline>,
    blend: ManuallyDrop<Pipeline>,
}

impl MaterialPipelines {
    /// Builds the descriptor machinery and both pipeline variants.
    ///
    /// # Errors
    ///
    /// Returns an error if the shader files cannot be read or any Vulkan
    /// object creation fails.
    pub fn new(
        device: Arc<Device>,
        shader_dir: &Path,
        color_format: vk::Format,
    ) -> RhiResult<Self> {
        let descriptor_set_layout = Self::create_set_layout(device.clone())?;
        let descriptor_pool = Self::create_descriptor_pool(device.clone())?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            shader_dir.join("material.vert.spv"),
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            shader_dir.join("material.frag.spv"),
            ShaderStage::Fragment,
        )?;

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(PushConstants::SIZE as u32);

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[descriptor_set_layout.handle()],
            &[push_constant_range],
        )?;

        let opaque = Self::variant_builder(&vertex_shader, &fragment_shader, color_format)
            .cull_mode(CullMode::Back)
            .color_blend_attachment(ColorBlendAttachment::disabled())
            .build(device.clone(), &pipeline_layout)?;

        let blend = Self::variant_builder(&vertex_shader, &fragment_shader, color_format)
            .cull_mode(CullMode::None)
            .color_blend_attachment(ColorBlendAttachment::alpha_blend())
            .build(device, &pipeline_layout)?;

        info!("Created material pipelines (opaque + blend)");

        Ok(Self {
            descriptor_set_layout: ManuallyDrop::new(descriptor_set_layout),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            opaque: ManuallyDrop::new(opaque),
            blend: ManuallyDrop::new(blend),
        })
    }

    /// Shared pipeline state for both variants.
    fn variant_builder<'a>(
        vertex_shader: &'a Shader,
        fragment_shader: &'a Shader,
        color_format: vk::Format,
    ) -> GraphicsPipelineBuilder<'a> {
        GraphicsPipelineBuilder::new()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .front_face(FrontFace::CounterClockwise)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(CompareOp::Less)
            .color_attachment_format(color_format)
            .depth_attachment_format(DEFAULT_DEPTH_FORMAT)
    }

    /// Material descriptor set layout: five combined image samplers plus the
    /// parameter uniform buffer on binding 4, all fragment-stage.
    fn create_set_layout(device: Arc<Device>) -> RhiResult<DescriptorSetLayout> {
        let stage = vk::ShaderStageFlags::FRAGMENT;
        let bindings = [
            DescriptorBindingBuilder::combined_image_sampler(0, stage),
            DescriptorBindingBuilder::combined_image_sampler(1, stage),
            DescriptorBindingBuilder::combined_image_sampler(2, stage),
            DescriptorBindingBuilder::combined_image_sampler(3, stage),
            DescriptorBindingBuilder::uniform_buffer(4, stage),
            DescriptorBindingBuilder::combined_image_sampler(5, stage),
        ];
        DescriptorSetLayout::new(device, &bindings)
    }

    fn create_descriptor_pool(device: Arc<Device>) -> RhiResult<DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(POOL_SAMPLER_COUNT),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(POOL_UNIFORM_COUNT),
        ];
        DescriptorPool::new(device, POOL_MAX_SETS, &pool_sizes)
    }

    /// Returns the material descriptor set layout.
    pub fn descriptor_set_layout(&self) -> &DescriptorSetLayout {
        &self.descriptor_set_layout
    }

    /// Returns the material descriptor pool.
    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }

    /// Returns the shared pipeline layout.
    pub fn layout(&self) -> &PipelineLayout {
        &self.pipeline_layout
    }

    /// Returns the opaque pipeline variant.
    pub fn opaque(&self) -> &Pipeline {
        &self.opaque
    }

    /// Returns the alpha-blend pipeline variant.
    pub fn blend(&self) -> &Pipeline {
        &self.blend
    }
}

impl Drop for MaterialPipelines {
    fn drop(&mut self) {
        // Pipelines before their layout; the pool releases its sets with it.
        unsafe {
            ManuallyDrop::drop(&mut self.blend);
            ManuallyDrop::drop(&mut self.opaque);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.descriptor_set_layout);
        }
    }
}
