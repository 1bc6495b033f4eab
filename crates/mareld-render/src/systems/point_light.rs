//! Point light billboards.

use crate::effects::RenderSystem;
use crate::frame::FrameContext;
use crate::layouts::EngineLayouts;
use crate::scene::{GlobalUbo, LightPush, Scene};
use crate::Result;
use ash::vk;
use glam::Vec4;
use mareld_gpu::pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
use mareld_gpu::GpuContext;
use std::path::Path;

/// Fills the UBO light array and draws one alpha-blended billboard quad
/// per point light. The quad corners are generated in the vertex shader;
/// no vertex buffers are bound.
pub struct PointLightSystem {
    pipeline: GraphicsPipeline,
}

impl PointLightSystem {
    /// Build the billboard pipeline.
    pub fn new(
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        shader_dir: &Path,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<Self> {
        let config = GraphicsPipelineConfig {
            vertex_shader_path: shader_dir.join("point_light.vert.spv"),
            fragment_shader_path: shader_dir.join("point_light.frag.spv"),
            blend_enable: true,
            depth_write: false,
            color_format,
            depth_format,
            ..Default::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(
                gpu.device(),
                &config,
                &[layouts.global],
                std::mem::size_of::<LightPush>() as u32,
            )?
        };

        Ok(Self { pipeline })
    }

    /// Copy the scene's lights into the global UBO for this frame.
    pub fn update(scene: &Scene, ubo: &mut GlobalUbo) {
        ubo.set_lights(scene);
    }

    /// Destroy the pipeline.
    ///
    /// # Safety
    /// The pipeline must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
    }
}

impl RenderSystem for PointLightSystem {
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

            for object in ctx.scene.iter() {
                let Some(light) = object.point_light else {
                    continue;
                };

                let p = object.transform.translation;
                let push = LightPush {
                    position: Vec4::new(p.x, p.y, p.z, 1.0),
                    color: Vec4::new(light.color.x, light.color.y, light.color.z, light.intensity),
                    radius: light.radius,
                    _padding: [0.0; 3],
                };
                device.cmd_push_constants(
                    cmd,
                    self.pipeline.layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );

                device.cmd_draw(cmd, 6, 1, 0, 0);
            }
        }
    }
}
