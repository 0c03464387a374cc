//! Vulkan rendering for the model viewer.
//!
//! This crate orchestrates the rendering process:
//! - Frame synchronization and command recording
//! - Material and mesh GPU upload
//! - Pipeline variants for opaque and blended materials

pub mod depth_buffer;
pub mod frame;
pub mod material;
pub mod mesh;
pub mod params;
pub mod pipelines;
pub mod renderer;

pub use material::{FallbackTextures, GpuMaterial, MaterialArena, MaterialHandle};
pub use mesh::{DrawableObject, GpuMesh};
pub use params::{MaterialParams, PushConstants};
pub use renderer::Renderer;
