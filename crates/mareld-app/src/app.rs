//! The application trait and engine context.

use ash::vk;
use mareld_gpu::GpuContext;
use mareld_render::renderer::{FrameHandles, FrameRenderer};
use mareld_render::{Camera, EngineLayouts, FrameContext, Scene};
use std::sync::Arc;
use winit::event::WindowEvent;
use winit::window::Window;

/// Engine-owned state shared with the application.
pub struct Engine {
    /// The window handle.
    pub window: Arc<Window>,
    /// GPU context with device and queue.
    pub gpu: GpuContext,
    /// Shared descriptor set layouts.
    pub layouts: EngineLayouts,
    /// The frame orchestrator.
    pub renderer: FrameRenderer,
}

impl Engine {
    /// Current swapchain aspect ratio.
    pub fn aspect_ratio(&self) -> f32 {
        self.renderer.aspect_ratio()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.renderer.extent()
    }
}

/// A Mareld application: owns the scene, camera, uniform buffers, and
/// draw systems; the runner owns the frame sequence.
pub trait MareldApp: Sized {
    /// Create the application. Load assets, build systems, register
    /// pre/post effects on `engine.renderer`.
    fn init(engine: &mut Engine) -> anyhow::Result<Self>;

    /// Handle a window event. Return true when consumed.
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        let _ = event;
        false
    }

    /// Per-frame simulation and camera control, before the frame opens.
    fn update(&mut self, engine: &Engine, dt: f32);

    /// Write this frame slot's uniform data. Runs after acquisition,
    /// once the slot's fence has been waited.
    fn prepare_frame(&mut self, engine: &Engine, frame: &FrameHandles, dt: f32);

    /// The camera for the frame being recorded.
    fn camera(&self) -> &Camera;

    /// The scene registry.
    fn scene(&self) -> &Scene;

    /// The global descriptor set of a frame slot.
    fn global_set(&self, frame_index: usize) -> vk::DescriptorSet;

    /// Record main-pass draws. The render pass is already open.
    fn render_main(&self, device: &ash::Device, ctx: &FrameContext<'_>);

    /// The surface was resized; size-dependent renderer resources have
    /// already been rebuilt.
    fn on_resize(&mut self, engine: &Engine, width: u32, height: u32) {
        let _ = (engine, width, height);
    }

    /// Destroy application resources. The GPU is idle.
    fn cleanup(&mut self, engine: &Engine);
}
