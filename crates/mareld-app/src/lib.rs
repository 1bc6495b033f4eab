//! Application framework for the Mareld engine.
//!
//! Owns the winit event loop and the per-frame drive sequence; the
//! application supplies the scene, camera, and draw recording through
//! the [`MareldApp`] trait.

pub mod app;
pub mod input;
pub mod runner;

pub use app::{Engine, MareldApp};
pub use input::KeyboardController;
pub use runner::{run_app, AppConfig};
