//! Asset loading for the model viewer.
//!
//! Decodes glTF files into CPU-side mesh, image, and material data. Nothing
//! in this crate touches the GPU; the renderer consumes these types and
//! performs the uploads.

mod error;
pub mod material;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use material::{AlphaMode, MaterialDesc, TextureRef};
pub use model::{ImageData, IndexData, MeshData, ModelData};
