//! Effect and draw-system interfaces.

use crate::frame::FrameContext;
use crate::Result;
use ash::vk;
use mareld_ocean::OceanGenerator;

/// A compute effect recorded before the main pass.
///
/// Invoked in registration order; records into `ctx.pre_cmd` only.
pub trait PreProcessEffect {
    /// Record this effect's dispatches.
    fn record_pre(&mut self, device: &ash::Device, ctx: &FrameContext<'_>) -> Result<()>;

    /// Release GPU resources at teardown. The GPU is idle.
    fn destroy(&mut self, gpu: &mareld_gpu::GpuContext) {
        let _ = gpu;
    }
}

/// A full-screen compute effect in the post-processing chain.
///
/// Reads the image bound in `input_set` (binding 0) and writes the
/// complementary image (binding 1), covering `extent` with 32x32
/// workgroups. `depth_set` exposes the scene depth read-only.
pub trait PostProcessEffect {
    /// Record one dispatch of this effect into `ctx.post_cmd`.
    fn record_post(
        &self,
        device: &ash::Device,
        ctx: &FrameContext<'_>,
        input_set: vk::DescriptorSet,
        depth_set: vk::DescriptorSet,
        extent: vk::Extent2D,
    );

    /// Release GPU resources at teardown. The GPU is idle.
    fn destroy(&mut self, gpu: &mareld_gpu::GpuContext) {
        let _ = gpu;
    }
}

/// A per-object-type draw issuer for the main pass.
pub trait RenderSystem {
    /// Record pipeline binds and draws into `ctx.main_cmd`.
    fn render(&self, device: &ash::Device, ctx: &FrameContext<'_>);
}

impl PreProcessEffect for OceanGenerator {
    fn record_pre(&mut self, device: &ash::Device, ctx: &FrameContext<'_>) -> Result<()> {
        unsafe {
            self.record(device, ctx.pre_cmd, ctx.frame_index, ctx.frame_time)?;
        }
        Ok(())
    }

    fn destroy(&mut self, gpu: &mareld_gpu::GpuContext) {
        unsafe {
            OceanGenerator::destroy(self, gpu);
        }
    }
}
