//! Frame orchestration and rendering pipeline for the Mareld engine.
//!
//! The [`renderer::FrameRenderer`] sequences each frame through three
//! chained submissions: pre-processing (the ocean simulation), the main
//! render pass, and the post-processing chain, linked by semaphore
//! handoffs and presented last. Draw systems record into the main pass;
//! effects record into the pre/post command buffers.

pub mod camera;
pub mod effects;
pub mod error;
pub mod frame;
pub mod layouts;
pub mod mesh;
pub mod post;
pub mod renderer;
pub mod scene;
pub mod slots;
pub mod systems;

pub use camera::Camera;
pub use effects::{PostProcessEffect, PreProcessEffect, RenderSystem};
pub use error::{RenderError, Result};
pub use frame::FrameContext;
pub use layouts::EngineLayouts;
pub use mesh::GpuMesh;
pub use post::PostProcessManager;
pub use renderer::FrameRenderer;
pub use scene::{GameObject, GlobalUbo, PointLight, Scene, Transform, MAX_LIGHTS};
