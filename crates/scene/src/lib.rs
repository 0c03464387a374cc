//! Scene-side state for the model viewer.

pub mod camera;

pub use camera::OrbitCamera;
