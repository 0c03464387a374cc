//! Core utilities for the model viewer.
//!
//! This crate provides foundational pieces used across the viewer:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
