//! Sun disc rendering.

use crate::effects::RenderSystem;
use crate::frame::FrameContext;
use crate::layouts::EngineLayouts;
use crate::Result;
use ash::vk;
use mareld_gpu::pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
use mareld_gpu::GpuContext;
use std::path::Path;

/// Draws the sun as a shader-generated quad along the UBO's sun
/// direction. Uses only the global set; no per-object state.
pub struct SunRenderSystem {
    pipeline: GraphicsPipeline,
}

impl SunRenderSystem {
    /// Build the sun pipeline.
    pub fn new(
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        shader_dir: &Path,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<Self> {
        let config = GraphicsPipelineConfig {
            vertex_shader_path: shader_dir.join("sun.vert.spv"),
            fragment_shader_path: shader_dir.join("sun.frag.spv"),
            blend_enable: true,
            depth_write: false,
            color_format,
            depth_format,
            ..Default::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(gpu.device(), &config, &[layouts.global], 0)?
        };

        Ok(Self { pipeline })
    }

    /// Destroy the pipeline.
    ///
    /// # Safety
    /// The pipeline must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
    }
}

impl RenderSystem for SunRenderSystem {
    fn render(&self, device: &ash::Device, ctx: &FrameContext<'_>) {
        let cmd = ctx.main_cmd;

        unsafe {
            self.pipeline.bind(device, cmd);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &[ctx.global_set],
                &[],
            );
            device.cmd_draw(cmd, 6, 1, 0, 0);
        }
    }
}
