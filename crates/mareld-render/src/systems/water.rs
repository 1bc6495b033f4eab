//! Water surface rendering.

use crate::effects::RenderSystem;
use crate::frame::FrameContext;
use crate::layouts::EngineLayouts;
use crate::mesh::{vertex_attributes, vertex_bindings};
use crate::scene::MeshPush;
use crate::Result;
use ash::vk;
use mareld_gpu::descriptors::{
    write_combined_image_sampler, DescriptorPool, DescriptorSetLayoutBuilder,
};
use mareld_gpu::pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
use mareld_gpu::GpuContext;
use mareld_ocean::OceanGenerator;
use std::path::Path;

/// Draws water-tagged meshes with the three bands' simulation outputs.
///
/// Binds nine sampled images per frame slot: displacement, derivatives,
/// and turbulence for each band, in cascade order. The vertex shader
/// displaces the grid; the fragment shader shades from derivatives and
/// turbulence.
pub struct WaterRenderSystem {
    pipeline: GraphicsPipeline,
    set_layout: vk::DescriptorSetLayout,
    pool: DescriptorPool,
    /// One set per frame in flight, matching the bands' frame slots.
    sets: Vec<vk::DescriptorSet>,
}

impl WaterRenderSystem {
    /// Build the water pipeline and bind the generator's outputs.
    pub fn new(
        gpu: &GpuContext,
        layouts: &EngineLayouts,
        shader_dir: &Path,
        color_format: vk::Format,
        depth_format: vk::Format,
        generator: &OceanGenerator,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let device = gpu.device();
        let bands = generator.bands();
        let binding_count = bands.len() * 3;

        let set_layout = unsafe {
            let mut builder = DescriptorSetLayoutBuilder::new();
            for binding in 0..binding_count as u32 {
                builder = builder.sampled_image(
                    binding,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                );
            }
            builder.build(device)?
        };

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count((binding_count * frames_in_flight) as u32)];
        let pool =
            unsafe { DescriptorPool::new(device, frames_in_flight as u32, &pool_sizes)? };

        let mut sets = Vec::with_capacity(frames_in_flight);
        for frame in 0..frames_in_flight {
            let set = unsafe { pool.allocate(device, &[set_layout])?[0] };
            for (band_index, band) in bands.iter().enumerate() {
                let outputs = band.output_textures(frame)?;
                for (output_index, texture) in outputs.iter().enumerate() {
                    unsafe {
                        write_combined_image_sampler(
                            device,
                            set,
                            (band_index * 3 + output_index) as u32,
                            texture.sampler(),
                            texture.view(),
                            texture.layout(),
                        );
                    }
                }
            }
            sets.push(set);
        }

        let config = GraphicsPipelineConfig {
            vertex_shader_path: shader_dir.join("water.vert.spv"),
            fragment_shader_path: shader_dir.join("water.frag.spv"),
            vertex_bindings: vertex_bindings(),
            vertex_attributes: vertex_attributes(),
            // Both sides of the surface are visible from below the waves.
            cull_mode: vk::CullModeFlags::NONE,
            color_format,
            depth_format,
            ..Default::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(
                device,
                &config,
                &[layouts.global, set_layout],
                std::mem::size_of::<MeshPush>() as u32,
            )?
        };

        Ok(Self {
            pipeline,
            set_layout,
            pool,
            sets,
        })
    }

    /// Destroy the pipeline and descriptor resources.
    ///
    /// # Safety
    /// The system must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let device = gpu.device();
        self.pipeline.destroy(device);
        self.pool.destroy(device);
        device.destroy_descriptor_set_layout(self.set_layout, None);
    }
}

impl RenderSystem for WaterRenderSystem {
    fn render(&self, device: &ash::Device, ctx: &FrameContext<'_>) {
        let cmd = ctx.main_cmd;

        unsafe {
            self.pipeline.bind(device, cmd);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &[ctx.global_set, self.sets[ctx.frame_index]],
                &[],
            );

            for object in ctx.scene.iter() {
                if !object.water {
                    continue;
                }
                let Some(mesh) = &object.mesh else {
                    continue;
                };

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
