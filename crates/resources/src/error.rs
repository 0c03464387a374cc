//! Asset loading errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while decoding model files.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to load glTF file {path}: {message}")]
    GltfLoad { path: PathBuf, message: String },

    #[error("model file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("model contains no renderable meshes")]
    NoMeshes,

    #[error("primitive is missing position data")]
    NoPositionData,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for asset loading.
pub type ResourceResult<T> = Result<T, ResourceError>;
