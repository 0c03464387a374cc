//! Main renderer orchestration.
//!
//! [`Renderer`] owns every Vulkan resource and drives the per-frame loop:
//! wait for the previous frame's fence, acquire a swapchain image, record
//! and submit the frame's commands, present, and wait for completion. The
//! viewer runs a single frame in flight.
//!
//! # Resource Destruction Order
//!
//! 1. Wait for all GPU work to complete
//! 2. Drop the loaded object, materials, and fallback textures
//! 3. Drop pipelines and descriptor resources
//! 4. Drop the depth buffer
//! 5. Drop per-frame objects and the upload pool
//! 6. Drop the swapchain
//! 7. Drop the device
//! 8. Drop the surface, then the instance
//!
//! ManuallyDrop enforces the order inside `Drop`.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::{debug, error, info, warn};

use viewer_core::Error;
use viewer_platform::{Surface, Window};
use viewer_resources::ModelData;
use viewer_rhi::command::{CommandBuffer, CommandPool};
use viewer_rhi::device::Device;
use viewer_rhi::instance::Instance;
use viewer_rhi::physical_device::select_physical_device;
use viewer_rhi::swapchain::Swapchain;
use viewer_rhi::{RhiError, RhiResult};
use viewer_scene::OrbitCamera;

use crate::depth_buffer::DepthBuffer;
use crate::frame::{FenceState, FrameContext};
use crate::material::{FallbackTextures, GpuMaterial, MaterialArena, MaterialHandle};
use crate::mesh::{DrawableObject, GpuMesh};
use crate::params::PushConstants;
use crate::pipelines::MaterialPipelines;

/// Fixed world-space light position.
const LIGHT_POSITION: Vec3 = Vec3::new(5.0, 5.0, 5.0);

/// Background clear color.
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// Main renderer that manages all Vulkan resources.
pub struct Renderer {
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<Arc<Device>>,
    swapchain: ManuallyDrop<Swapchain>,
    upload_pool: ManuallyDrop<CommandPool>,
    frame: ManuallyDrop<FrameContext>,
    depth_buffer: ManuallyDrop<DepthBuffer>,
    pipelines: ManuallyDrop<MaterialPipelines>,
    fallbacks: ManuallyDrop<FallbackTextures>,

    materials: MaterialArena,
    object: Option<DrawableObject>,

    fence_state: FenceState,
    framebuffer_resized: bool,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Creates a renderer for the given window.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan resource creation fails; the renderer
    /// treats every setup failure as fatal.
    pub fn new(window: &Window, shader_dir: &Path) -> viewer_core::Result<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let enable_validation = cfg!(debug_assertions);
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::Window(e.to_string()))?;
        let surface_extensions = viewer_platform::get_required_extensions(display_handle.as_raw())?;
        let instance =
            Instance::new(enable_validation, &surface_extensions).map_err(vulkan_error)?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            PushConstants::SIZE as u32,
        )
        .map_err(vulkan_error)?;
        let device = Device::new(&instance, &physical_device_info).map_err(vulkan_error)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)
            .map_err(vulkan_error)?;
        let depth_buffer =
            DepthBuffer::with_default_format(device.clone(), width, height).map_err(vulkan_error)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or_else(|| Error::Vulkan("device has no graphics queue".to_string()))?;
        let upload_pool =
            CommandPool::new_transient(device.clone(), graphics_family).map_err(vulkan_error)?;
        let frame = FrameContext::new(device.clone()).map_err(vulkan_error)?;

        let pipelines = MaterialPipelines::new(device.clone(), shader_dir, swapchain.format())
            .map_err(|e| Error::Shader(e.to_string()))?;
        let fallbacks =
            FallbackTextures::new(device.clone(), &upload_pool).map_err(vulkan_error)?;

        info!(
            "Renderer initialized: {} swapchain images, 1 frame in flight",
            swapchain.image_count()
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            swapchain: ManuallyDrop::new(swapchain),
            upload_pool: ManuallyDrop::new(upload_pool),
            frame: ManuallyDrop::new(frame),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            pipelines: ManuallyDrop::new(pipelines),
            fallbacks: ManuallyDrop::new(fallbacks),
            materials: MaterialArena::new(),
            object: None,
            fence_state: FenceState::new(),
            framebuffer_resized: false,
            width,
            height,
        })
    }

    /// Loads a glTF model and uploads its meshes and materials.
    ///
    /// Replaces any previously loaded object after waiting for the GPU to
    /// finish with its resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be decoded or the GPU upload
    /// fails.
    pub fn load_model<P: AsRef<Path>>(&mut self, path: P) -> viewer_core::Result<()> {
        let path = path.as_ref();
        info!("Loading model: {}", path.display());

        let model = ModelData::load(path).map_err(|e| Error::Asset(e.to_string()))?;

        if self.object.is_some() || !self.materials.is_empty() {
            self.device.wait_idle().map_err(vulkan_error)?;
            self.object = None;

            // Return the old materials' descriptor sets to the pool so
            // repeated loads do not exhaust it.
            let sets: Vec<_> = self
                .materials
                .iter()
                .map(GpuMaterial::descriptor_set)
                .collect();
            if !sets.is_empty() {
                if let Err(e) = self.pipelines.descriptor_pool().free(&sets) {
                    warn!("Failed to free descriptor sets: {}", e);
                }
            }
            self.materials.clear();
        }

        // Upload materials first so meshes can refer to them by handle.
        let mut handles = Vec::with_capacity(model.materials.len());
        for desc in &model.materials {
            let material = GpuMaterial::new(
                (*self.device).clone(),
                &self.upload_pool,
                self.pipelines.descriptor_pool(),
                self.pipelines.descriptor_set_layout().handle(),
                desc,
                &model.images,
                &self.fallbacks,
            )
            .map_err(vulkan_error)?;
            handles.push(self.materials.insert(material));
        }

        // Meshes without a material index draw with an all-defaults material.
        let default_handle = if model.meshes.iter().any(|m| m.material_index.is_none()) {
            let material = GpuMaterial::new(
                (*self.device).clone(),
                &self.upload_pool,
                self.pipelines.descriptor_pool(),
                self.pipelines.descriptor_set_layout().handle(),
                &Default::default(),
                &[],
                &self.fallbacks,
            )
            .map_err(vulkan_error)?;
            Some(self.materials.insert(material))
        } else {
            None
        };

        let mut meshes = Vec::with_capacity(model.meshes.len());
        for mesh in &model.meshes {
            let handle = mesh
                .material_index
                .and_then(|i| handles.get(i).copied())
                .or(default_handle)
                .unwrap_or(MaterialHandle(0));
            meshes.push(
                GpuMesh::new((*self.device).clone(), mesh, handle).map_err(vulkan_error)?,
            );
        }

        info!(
            "Model uploaded: {} meshes, {} materials",
            meshes.len(),
            self.materials.len()
        );
        self.object = Some(DrawableObject::new(meshes));
        Ok(())
    }

    /// Replaces the loaded object's model transform.
    pub fn set_model_transform(&mut self, transform: Mat4) {
        if let Some(object) = &mut self.object {
            object.set_transform(transform);
        }
    }

    /// Notifies the renderer that the window was resized.
    ///
    /// Swapchain recreation happens at the start of the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return;
        }
        if width != self.width || height != self.height {
            debug!(
                "Resize triggered: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.framebuffer_resized = true;
        }
    }

    /// Renders one frame from the camera's point of view.
    ///
    /// Acquire, submit, and present failures are treated as recoverable:
    /// the frame is dropped with a logged warning and the next call tries
    /// again.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures the loop cannot continue past,
    /// such as a failed swapchain recreation.
    pub fn render_frame(&mut self, camera: &OrbitCamera) -> RhiResult<()> {
        if self.framebuffer_resized {
            self.recreate_swapchain()?;
        }

        let sync = self.frame.sync();
        // Skipped when the previous frame never reached the queue; waiting
        // on the still-unsignaled fence would block forever.
        if self.fence_state.wait_required() {
            sync.in_flight_fence().wait(u64::MAX)?;
        }

        let acquire_semaphore = sync.image_available_semaphore().handle();
        let (image_index, _suboptimal) = match self.swapchain.acquire_next_image(acquire_semaphore)
        {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire, recreating");
                self.recreate_swapchain()?;
                return Ok(());
            }
            Err(e) => {
                warn!("Image acquire failed ({:?}), dropping frame", e);
                return Ok(());
            }
        };

        sync.in_flight_fence().reset()?;
        self.fence_state.on_reset();

        self.record_commands(image_index, camera)?;

        let wait_semaphores = [acquire_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished_semaphore().handle()];
        let command_buffers = [self.frame.command_buffer().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let submit_result = unsafe {
            self.device
                .submit_graphics(&[submit_info], sync.in_flight_fence().handle())
        };
        if let Err(e) = submit_result {
            warn!("Queue submit failed ({}), dropping frame", e);
            return Ok(());
        }
        self.fence_state.on_submit();

        let present_result = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            sync.render_finished_semaphore().handle(),
        );

        match present_result {
            Ok(suboptimal) => {
                if suboptimal {
                    self.framebuffer_resized = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Swapchain stale on present, recreating next frame");
                self.framebuffer_resized = true;
            }
            Err(e) => {
                warn!("Present failed ({:?}), dropping frame", e);
            }
        }

        // Single frame in flight: the CPU stays in lockstep with the GPU.
        sync.in_flight_fence().wait(u64::MAX)?;

        Ok(())
    }

    /// Recreates the swapchain and depth buffer for the current size.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        self.device.wait_idle()?;

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.width,
            self.height,
        )?;

        let new_depth_buffer =
            DepthBuffer::with_default_format((*self.device).clone(), self.width, self.height)?;
        unsafe {
            ManuallyDrop::drop(&mut self.depth_buffer);
        }
        self.depth_buffer = ManuallyDrop::new(new_depth_buffer);

        self.framebuffer_resized = false;
        Ok(())
    }

    /// Records the frame's command buffer.
    fn record_commands(&self, image_index: u32, camera: &OrbitCamera) -> RhiResult<()> {
        let cmd = self.frame.command_buffer();

        cmd.reset()?;
        cmd.begin()?;

        let color_image = self.swapchain.image(image_index as usize);
        self.transition_image(
            cmd,
            color_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        self.transition_image(
            cmd,
            self.depth_buffer.image(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::DEPTH,
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index as usize))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_buffer.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let extent = self.swapchain.extent();
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        cmd.set_viewport(&viewport);
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        });

        if let Some(object) = &self.object {
            let aspect = extent.width as f32 / extent.height.max(1) as f32;
            let push = PushConstants::new(
                object.transform(),
                camera.view_projection_matrix(aspect),
                LIGHT_POSITION,
                camera.position(),
            );

            // Opaque and alpha-tested meshes first, blended meshes after.
            self.draw_meshes(cmd, object, &push, false);
            self.draw_meshes(cmd, object, &push, true);
        }

        cmd.end_rendering();

        self.transition_image(
            cmd,
            color_image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );

        cmd.end()?;
        Ok(())
    }

    /// Draws the object's meshes whose material matches the blend pass.
    fn draw_meshes(
        &self,
        cmd: &CommandBuffer,
        object: &DrawableObject,
        push: &PushConstants,
        blended: bool,
    ) {
        let pipeline = if blended {
            self.pipelines.blend()
        } else {
            self.pipelines.opaque()
        };
        let layout = self.pipelines.layout().handle();

        let mut bound = false;
        for mesh in object.meshes() {
            let Some(material) = self.materials.get(mesh.material()) else {
                warn!("Mesh references missing material {:?}", mesh.material());
                continue;
            };
            if material.is_blended() != blended {
                continue;
            }

            if !bound {
                cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
                cmd.push_constants(
                    layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    push,
                );
                bound = true;
            }

            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[material.descriptor_set()],
            );
            cmd.bind_vertex_buffers(0, &[mesh.vertex_buffer().handle()], &[0]);
            cmd.bind_index_buffer(mesh.index_buffer().handle(), 0, vk::IndexType::UINT32);
            cmd.draw_indexed(mesh.index_count(), 1, 0, 0, 0);
        }
    }

    /// Records an image layout transition.
    fn transition_image(
        &self,
        cmd: &CommandBuffer,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        aspect_mask: vk::ImageAspectFlags,
    ) {
        let (src_stage, src_access, dst_stage, dst_access) = match (old_layout, new_layout) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL) => (
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::AccessFlags::empty(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL) => (
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::AccessFlags::empty(),
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR) => (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::AccessFlags::empty(),
            ),
            _ => {
                warn!(
                    "Unhandled layout transition: {:?} -> {:?}",
                    old_layout, new_layout
                );
                (
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
                )
            }
        };

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        cmd.pipeline_barrier(src_stage, dst_stage, &[barrier]);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }

        self.object = None;
        self.materials.clear();

        unsafe {
            ManuallyDrop::drop(&mut self.fallbacks);
            ManuallyDrop::drop(&mut self.pipelines);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.frame);
            ManuallyDrop::drop(&mut self.upload_pool);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

fn vulkan_error(e: RhiError) -> Error {
    Error::Vulkan(e.to_string())
}
