//! Windowing and input for the model viewer.

pub mod input;
pub mod window;

pub use input::{InputState, KeyCode};
pub use window::{get_required_extensions, Surface, Window};
