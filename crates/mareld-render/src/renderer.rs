//! The frame orchestrator.
//!
//! Sequences each frame through three chained submissions on the
//! graphics queue:
//!
//! 1. pre-processing (compute: the ocean pipeline), waits image
//!    acquisition, signals S1;
//! 2. the main render pass, waits S1, signals S2;
//! 3. post-processing (chained compute over the swapchain image), waits
//!    S2, signals S3 and arms the frame slot's fence;
//!
//! followed by present waiting S3. The semaphores travel between stages
//! as [`SyncHandoff`] values: each stage consumes the previous stage's
//! handoff and returns a fresh one, so a stale semaphore cannot leak
//! across stages or frames.

use crate::effects::PreProcessEffect;
use crate::frame::FrameContext;
use crate::layouts::EngineLayouts;
use crate::post::PostProcessManager;
use crate::slots::FrameSlots;
use crate::{RenderError, Result};
use ash::vk;
use mareld_gpu::barrier::{self, ImageState};
use mareld_gpu::command::{self, CommandPool};
use mareld_gpu::swapchain::Swapchain;
use mareld_gpu::sync::{create_semaphore, FrameSync, SyncHandoff};
use mareld_gpu::{GpuContext, SurfaceContext, MAX_FRAMES_IN_FLIGHT};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Default timeout for fence waits and image acquisition.
const FRAME_TIMEOUT_NS: u64 = 2_000_000_000;

/// Per-frame-slot command buffers and synchronization.
struct FrameResources {
    sync: FrameSync,
    pre_cmd: vk::CommandBuffer,
    main_cmd: vk::CommandBuffer,
    post_cmd: vk::CommandBuffer,
}

/// Command buffer handles for one frame's recording, returned by
/// [`FrameRenderer::begin_frame`].
#[derive(Debug, Clone, Copy)]
pub struct FrameHandles {
    pub frame_index: usize,
    pub image_index: usize,
    pub pre_cmd: vk::CommandBuffer,
    pub main_cmd: vk::CommandBuffer,
    pub post_cmd: vk::CommandBuffer,
}

/// Owns the swapchain, per-frame resources, the effect lists, and the
/// post-processing manager; drives the per-frame sequence.
pub struct FrameRenderer {
    surface: SurfaceContext,
    swapchain: Swapchain,
    command_pool: CommandPool,
    frames: Vec<FrameResources>,
    /// Present-wait semaphores, one per swapchain image: the present
    /// engine may hold an image's semaphore longer than any frame slot.
    post_finished: Vec<vk::Semaphore>,
    post: PostProcessManager,
    pre_effects: Vec<Box<dyn PreProcessEffect>>,
    slots: FrameSlots,
    current_image: usize,
    frame_in_progress: bool,
    vsync: bool,
}

impl FrameRenderer {
    /// Create the renderer for a window.
    pub fn new<W>(
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        window: &W,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let surface = unsafe { SurfaceContext::from_window(gpu, window)? };
        let swapchain =
            unsafe { surface.create_swapchain(gpu, width, height, vsync, None)? };

        tracing::info!(
            "Swapchain created: {}x{} ({} images)",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len()
        );

        let command_pool = unsafe {
            CommandPool::new(
                gpu.device(),
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let cmds = unsafe { command_pool.allocate(gpu.device(), 3)? };
            frames.push(FrameResources {
                sync: unsafe { FrameSync::new(gpu.device())? },
                pre_cmd: cmds[0],
                main_cmd: cmds[1],
                post_cmd: cmds[2],
            });
        }

        let mut post_finished = Vec::with_capacity(swapchain.images.len());
        for _ in 0..swapchain.images.len() {
            post_finished.push(unsafe { create_semaphore(gpu.device())? });
        }

        let post = PostProcessManager::new(
            gpu,
            &command_pool,
            layouts,
            &swapchain,
            MAX_FRAMES_IN_FLIGHT,
        )?;

        Ok(Self {
            surface,
            swapchain,
            command_pool,
            frames,
            post_finished,
            post,
            pre_effects: Vec::new(),
            slots: FrameSlots::new(MAX_FRAMES_IN_FLIGHT),
            current_image: 0,
            frame_in_progress: false,
            vsync,
        })
    }

    /// Register a pre-processing effect; invoked in registration order.
    pub fn add_pre_effect(&mut self, effect: Box<dyn PreProcessEffect>) {
        self.pre_effects.push(effect);
    }

    /// Register a post-processing effect; invoked in registration order.
    pub fn add_post_effect(&mut self, effect: Box<dyn crate::PostProcessEffect>) {
        self.post.add_effect(effect);
    }

    /// Begin a frame: wait the slot fence, acquire an image, and open
    /// all three command buffers.
    ///
    /// [`RenderError::SwapchainOutOfDate`] means no image was acquired;
    /// call [`Self::recreate_swapchain`] and retry from here.
    pub fn begin_frame(&mut self, gpu: &GpuContext) -> Result<FrameHandles> {
        if self.frame_in_progress {
            return Err(RenderError::FrameState(
                "begin_frame while a frame is in progress".into(),
            ));
        }

        let device = gpu.device();
        let frame_index = self.slots.current();
        let frame = &self.frames[frame_index];

        unsafe {
            // Slot resources are untouchable until the GPU is done with
            // the slot's previous frame.
            frame.sync.wait(device, FRAME_TIMEOUT_NS)?;

            let (image_index, _suboptimal) = self.swapchain.acquire_next_image(
                &self.surface.swapchain_loader,
                frame.sync.image_available,
                FRAME_TIMEOUT_NS,
            )?;

            // Only reset the fence once the acquire succeeded; resetting
            // before a failed acquire would deadlock the next wait.
            frame.sync.reset(device)?;

            for cmd in [frame.pre_cmd, frame.main_cmd, frame.post_cmd] {
                device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
                command::begin_one_time(device, cmd)?;
            }

            self.current_image = image_index as usize;
        }

        self.frame_in_progress = true;

        Ok(FrameHandles {
            frame_index,
            image_index: self.current_image,
            pre_cmd: self.frames[frame_index].pre_cmd,
            main_cmd: self.frames[frame_index].main_cmd,
            post_cmd: self.frames[frame_index].post_cmd,
        })
    }

    /// Record all pre-processing effects and submit the pre command
    /// buffer. Returns the handoff the main submission must wait on.
    pub fn execute_pre_processing(
        &mut self,
        gpu: &GpuContext,
        ctx: &FrameContext<'_>,
    ) -> Result<SyncHandoff> {
        let device = gpu.device();

        for effect in &mut self.pre_effects {
            effect.record_pre(device, ctx)?;
        }

        let frame = &self.frames[ctx.frame_index];
        unsafe {
            device.end_command_buffer(frame.pre_cmd)?;

            command::submit(
                device,
                gpu.graphics_queue(),
                frame.pre_cmd,
                &[frame.sync.image_available],
                &[vk::PipelineStageFlags::ALL_COMMANDS],
                &[frame.sync.pre_finished],
                vk::Fence::null(),
            )?;
        }

        // Wave outputs are read as early as the water vertex stage, so
        // the main submission waits before any command runs.
        Ok(SyncHandoff::new(
            frame.sync.pre_finished,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ))
    }

    /// Open the main dynamic-rendering pass over the acquired swapchain
    /// image and its depth attachment.
    pub fn begin_main_pass(&mut self, gpu: &GpuContext, ctx: &FrameContext<'_>) -> Result<()> {
        let device = gpu.device();
        let cmd = ctx.main_cmd;
        let image = self.swapchain.images[self.current_image];
        let depth = &self.swapchain.depth_attachments[self.current_image];
        let extent = self.swapchain.extent;

        unsafe {
            // Old contents are irrelevant: transition from Undefined.
            barrier::transition(
                device,
                cmd,
                image,
                ImageState::Undefined,
                ImageState::ColorAttachment,
            )?;
            barrier::transition(
                device,
                cmd,
                depth.image.image,
                ImageState::Undefined,
                ImageState::DepthAttachment,
            )?;

            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(self.swapchain.image_views[self.current_image])
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: [0.01, 0.01, 0.01, 1.0],
                    },
                });

            let depth_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(depth.view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                });

            let rendering_info = vk::RenderingInfo::default()
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&color_attachment))
                .depth_attachment(&depth_attachment);

            device.cmd_begin_rendering(cmd, &rendering_info);

            let viewport = vk::Viewport::default()
                .width(extent.width as f32)
                .height(extent.height as f32)
                .min_depth(0.0)
                .max_depth(1.0);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(
                cmd,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                }],
            );
        }

        Ok(())
    }

    /// Close the main pass and move the image to presentable state (the
    /// post-processing chain picks it up from there).
    pub fn end_main_pass(&mut self, gpu: &GpuContext, ctx: &FrameContext<'_>) -> Result<()> {
        let device = gpu.device();
        let cmd = ctx.main_cmd;
        let image = self.swapchain.images[self.current_image];

        unsafe {
            device.cmd_end_rendering(cmd);
            barrier::transition(
                device,
                cmd,
                image,
                ImageState::ColorAttachment,
                ImageState::PresentSrc,
            )?;
        }
        Ok(())
    }

    /// Submit the main command buffer, consuming the pre-processing
    /// handoff and producing the one post-processing waits on.
    pub fn submit_main(
        &mut self,
        gpu: &GpuContext,
        ctx: &FrameContext<'_>,
        handoff: SyncHandoff,
    ) -> Result<SyncHandoff> {
        let device = gpu.device();
        let frame = &self.frames[ctx.frame_index];

        unsafe {
            device.end_command_buffer(frame.main_cmd)?;
            command::submit(
                device,
                gpu.graphics_queue(),
                frame.main_cmd,
                &[handoff.semaphore()],
                &[handoff.wait_stage()],
                &[frame.sync.main_finished],
                vk::Fence::null(),
            )?;
        }

        Ok(SyncHandoff::new(
            frame.sync.main_finished,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ))
    }

    /// Record and submit the post-processing chain. The submission arms
    /// the frame slot's fence: it is the frame's last queue work.
    pub fn render_post_processing(
        &mut self,
        gpu: &GpuContext,
        ctx: &FrameContext<'_>,
        handoff: SyncHandoff,
    ) -> Result<SyncHandoff> {
        let device = gpu.device();
        let image = self.swapchain.images[self.current_image];
        let depth_image = self.swapchain.depth_attachments[self.current_image].image.image;

        unsafe {
            self.post.record_chain(gpu, ctx, image, depth_image)?;
        }

        let frame = &self.frames[ctx.frame_index];
        let signal = self.post_finished[self.current_image];
        unsafe {
            device.end_command_buffer(frame.post_cmd)?;
            command::submit(
                device,
                gpu.graphics_queue(),
                frame.post_cmd,
                &[handoff.semaphore()],
                &[handoff.wait_stage()],
                &[signal],
                frame.sync.in_flight,
            )?;
        }

        Ok(SyncHandoff::new(
            signal,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        ))
    }

    /// Present the frame, waiting on the final handoff.
    ///
    /// The frame slot advances whether or not presentation succeeded;
    /// on [`RenderError::SwapchainOutOfDate`] the caller recreates the
    /// swapchain and the next `begin_frame` starts clean.
    pub fn present_frame(&mut self, gpu: &GpuContext, handoff: SyncHandoff) -> Result<()> {
        let needs_recreate = unsafe {
            self.swapchain.present(
                &self.surface.swapchain_loader,
                gpu.graphics_queue(),
                self.current_image as u32,
                &[handoff.semaphore()],
            )?
        };

        self.frame_in_progress = false;
        self.slots.advance();

        if needs_recreate {
            return Err(RenderError::SwapchainOutOfDate);
        }
        Ok(())
    }

    /// Tear down and rebuild everything sized to the surface: the
    /// swapchain, its depth attachments, the post-processing scratch
    /// textures and descriptor sets, and the per-image present
    /// semaphores. Size-independent resources (wave textures, pipelines,
    /// registered effects) are untouched.
    pub fn recreate_swapchain(
        &mut self,
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        width: u32,
        height: u32,
    ) -> Result<()> {
        gpu.wait_idle()?;

        unsafe {
            self.swapchain
                .destroy(gpu, &self.surface.swapchain_loader);
            self.swapchain = self
                .surface
                .create_swapchain(gpu, width, height, self.vsync, None)?;

            for semaphore in self.post_finished.drain(..) {
                gpu.device().destroy_semaphore(semaphore, None);
            }
            for _ in 0..self.swapchain.images.len() {
                self.post_finished.push(create_semaphore(gpu.device())?);
            }

            self.post.recreate(
                gpu,
                &self.command_pool,
                layouts,
                &self.swapchain,
                MAX_FRAMES_IN_FLIGHT,
            )?;
        }

        self.frame_in_progress = false;

        tracing::info!(
            "Swapchain recreated: {}x{}",
            self.swapchain.extent.width,
            self.swapchain.extent.height
        );
        Ok(())
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    /// Width / height of the swapchain.
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.extent.width as f32 / self.swapchain.extent.height as f32
    }

    /// Swapchain color format, for graphics pipeline creation.
    pub fn color_format(&self) -> vk::Format {
        self.swapchain.format
    }

    /// Depth format, for graphics pipeline creation.
    pub fn depth_format(&self) -> vk::Format {
        self.swapchain.depth_format
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.count()
    }

    /// Whether a frame is between `begin_frame` and `present_frame`.
    pub fn frame_in_progress(&self) -> bool {
        self.frame_in_progress
    }

    /// The command pool, for setup-time uploads.
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// The post-processing manager.
    pub fn post_manager_mut(&mut self) -> &mut PostProcessManager {
        &mut self.post
    }

    /// Destroy all resources.
    ///
    /// # Safety
    /// The GPU must be idle.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let device = gpu.device();

        for effect in &mut self.pre_effects {
            effect.destroy(gpu);
        }
        self.pre_effects.clear();

        self.post.destroy(gpu);

        for semaphore in self.post_finished.drain(..) {
            device.destroy_semaphore(semaphore, None);
        }
        for frame in &self.frames {
            frame.sync.destroy(device);
        }
        self.frames.clear();

        self.command_pool.destroy(device);
        self.swapchain.destroy(gpu, &self.surface.swapchain_loader);
        self.surface.destroy();
    }
}
