//! Post-processing effects of the demo.

use ash::vk;
use glam::Vec2;
use mareld_gpu::pipeline::ComputePipeline;
use mareld_gpu::{GpuContext, Result};
use mareld_render::{EngineLayouts, FrameContext, PostProcessEffect};
use std::path::Path;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FogPush {
    extent: Vec2,
    density: f32,
    _padding: f32,
}

/// Depth-aware distance fog over the finished frame.
///
/// Reads the scene color from the bound input image and scene depth
/// from the depth set, writes the fogged color to the complementary
/// image of the pair.
pub struct DepthFogEffect {
    pipeline: ComputePipeline,
    density: f32,
}

impl DepthFogEffect {
    pub fn new(
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        shader_dir: &Path,
        density: f32,
    ) -> Result<Self> {
        let pipeline = unsafe {
            ComputePipeline::from_path(
                gpu.device(),
                shader_dir.join("depth_fog.comp.spv"),
                &[layouts.post_pair, layouts.depth],
                std::mem::size_of::<FogPush>() as u32,
            )?
        };

        Ok(Self { pipeline, density })
    }
}

impl PostProcessEffect for DepthFogEffect {
    fn record_post(
        &self,
        device: &ash::Device,
        ctx: &FrameContext<'_>,
        input_set: vk::DescriptorSet,
        depth_set: vk::DescriptorSet,
        extent: vk::Extent2D,
    ) {
        let cmd = ctx.post_cmd;
        unsafe {
            self.pipeline.bind(device, cmd);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline.layout,
                0,
                &[input_set, depth_set],
                &[],
            );

            let push = FogPush {
                extent: Vec2::new(extent.width as f32, extent.height as f32),
                density: self.density,
                _padding: 0.0,
            };
            device.cmd_push_constants(
                cmd,
                self.pipeline.layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytemuck::bytes_of(&push),
            );

            device.cmd_dispatch(cmd, extent.width.div_ceil(32), extent.height.div_ceil(32), 1);
        }
    }

    fn destroy(&mut self, gpu: &GpuContext) {
        unsafe {
            self.pipeline.destroy(gpu.device());
        }
    }
}
