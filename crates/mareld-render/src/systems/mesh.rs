//! Textured mesh rendering.

use crate::effects::RenderSystem;
use crate::frame::FrameContext;
use crate::layouts::EngineLayouts;
use crate::mesh::{vertex_attributes, vertex_bindings};
use crate::scene::MeshPush;
use crate::Result;
use ash::vk;
use mareld_gpu::pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
use mareld_gpu::GpuContext;
use std::path::Path;

/// Draws every textured, non-water mesh in the scene.
pub struct MeshRenderSystem {
    pipeline: GraphicsPipeline,
}

impl MeshRenderSystem {
    /// Build the mesh pipeline.
    pub fn new(
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        shader_dir: &Path,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<Self> {
        let config = GraphicsPipelineConfig {
            vertex_shader_path: shader_dir.join("mesh.vert.spv"),
            fragment_shader_path: shader_dir.join("mesh.frag.spv"),
            vertex_bindings: vertex_bindings(),
            vertex_attributes: vertex_attributes(),
            cull_mode: vk::CullModeFlags::BACK,
            color_format,
            depth_format,
            ..Default::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(
                gpu.device(),
                &config,
                &[layouts.global, layouts.material],
                std::mem::size_of::<MeshPush>() as u32,
            )?
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

impl RenderSystem for MeshRenderSystem {
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
                if object.water {
                    continue;
                }
                let (Some(mesh), Some(texture_set)) = (&object.mesh, object.texture_set) else {
                    continue;
                };

                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.layout,
                    1,
                    &[texture_set],
                    &[],
                );

                let push = MeshPush::from_transform(&object.transform);
                device.cmd_push_constants(
                    cmd,
                    self.pipeline.layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );

                mesh.record_draw(device, cmd);
            }
        }
    }
}
