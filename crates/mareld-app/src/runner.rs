//! Application runner and event loop.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use mareld_gpu::GpuContextBuilder;
use mareld_render::{EngineLayouts, FrameContext, FrameRenderer, RenderError};

use crate::app::{Engine, MareldApp};

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Mareld Engine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            validation: cfg!(debug_assertions),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }
}

/// Run a MareldApp with the given configuration.
///
/// Initializes logging, creates the window, GPU context, and renderer,
/// and runs the event loop until the application exits.
pub fn run_app<A: MareldApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
    };

    if let Err(e) = event_loop.run_app(&mut runner) {
        error!("Event loop error: {e}");
    }

    Ok(())
}

struct AppRunner<A: MareldApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
}

struct AppState<A: MareldApp> {
    engine: Engine,
    app: A,
    last_frame_time: Instant,
}

impl<A: MareldApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready");
            }
            Err(e) => {
                error!("Failed to initialize application: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render error: {e}");
                    }
                    state.engine.window.request_redraw();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.handle_resize(size.width, size.height) {
                        error!("Resize error: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.engine.window.request_redraw();
        }
    }
}

impl<A: MareldApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build()?;

        let layouts = EngineLayouts::new(&gpu)?;

        let size = window.inner_size();
        let renderer = FrameRenderer::new(
            &gpu,
            &layouts,
            window.as_ref(),
            size.width.max(1),
            size.height.max(1),
            self.config.vsync,
        )?;

        let mut engine = Engine {
            window,
            gpu,
            layouts,
            renderer,
        };

        let app = A::init(&mut engine)?;

        Ok(AppState {
            engine,
            app,
            last_frame_time: Instant::now(),
        })
    }
}

impl<A: MareldApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        self.app.update(&self.engine, dt);

        let engine = &mut self.engine;

        // Acquire; out-of-date surfaces recreate and retry next redraw.
        let handles = match engine.renderer.begin_frame(&engine.gpu) {
            Ok(handles) => handles,
            Err(RenderError::SwapchainOutOfDate) => {
                self.recreate_swapchain()?;
                return Ok(());
            }
            Err(RenderError::AcquireTimeout) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        self.app.prepare_frame(engine, &handles, dt);

        let ctx = FrameContext {
            frame_index: handles.frame_index,
            image_index: handles.image_index,
            frame_time: dt,
            pre_cmd: handles.pre_cmd,
            main_cmd: handles.main_cmd,
            post_cmd: handles.post_cmd,
            camera: self.app.camera(),
            global_set: self.app.global_set(handles.frame_index),
            scene: self.app.scene(),
        };

        // The three chained submissions: each stage consumes the
        // previous handoff and returns the next.
        let handoff = engine.renderer.execute_pre_processing(&engine.gpu, &ctx)?;

        engine.renderer.begin_main_pass(&engine.gpu, &ctx)?;
        self.app.render_main(engine.gpu.device(), &ctx);
        engine.renderer.end_main_pass(&engine.gpu, &ctx)?;
        let handoff = engine.renderer.submit_main(&engine.gpu, &ctx, handoff)?;

        let handoff = engine
            .renderer
            .render_post_processing(&engine.gpu, &ctx, handoff)?;

        drop(ctx);

        match engine.renderer.present_frame(&engine.gpu, handoff) {
            Ok(()) => Ok(()),
            Err(RenderError::SwapchainOutOfDate) => {
                self.recreate_swapchain()?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn recreate_swapchain(&mut self) -> anyhow::Result<()> {
        let size = self.engine.window.inner_size();
        self.handle_resize(size.width, size.height)
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        let engine = &mut self.engine;
        engine
            .renderer
            .recreate_swapchain(&engine.gpu, &engine.layouts, width, height)?;

        self.app.on_resize(&self.engine, width, height);
        info!("Resized to {}x{}", width, height);
        Ok(())
    }

    fn cleanup(&mut self) {
        info!("Starting cleanup...");
        if let Err(e) = self.engine.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&self.engine);

        unsafe {
            let engine = &mut self.engine;
            engine.renderer.destroy(&engine.gpu);
            engine.layouts.destroy(&engine.gpu);
        }
        info!("Cleanup complete");
    }
}
