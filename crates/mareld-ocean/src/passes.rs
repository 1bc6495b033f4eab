//! Compute pass wrappers of the wave pipeline.
//!
//! Each pass owns its pipeline and descriptor sets and records exactly
//! one dispatch. Barriers between passes are the band recorder's job
//! ([`crate::band`]), never inserted here.

use crate::spectrum::{GridPush, IfftPush, MergePush, SpectrumUniform, TimePush};
use crate::{FIELD_COUNT, GROUPS};
use ash::vk;
use gpu_allocator::MemoryLocation;
use mareld_gpu::descriptors::{
    write_storage_image, write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder,
};
use mareld_gpu::memory::GpuBuffer;
use mareld_gpu::pipeline::ComputePipeline;
use mareld_gpu::texture::Texture;
use mareld_gpu::{GpuContext, Result};
use std::path::Path;

/// Build a layout of `count` storage images at bindings 0..count.
unsafe fn storage_image_layout(
    device: &ash::Device,
    count: u32,
) -> Result<vk::DescriptorSetLayout> {
    let mut builder = DescriptorSetLayoutBuilder::new();
    for binding in 0..count {
        builder = builder.storage_image(binding, vk::ShaderStageFlags::COMPUTE);
    }
    builder.build(device)
}

unsafe fn dispatch_grid(device: &ash::Device, cmd: vk::CommandBuffer) {
    device.cmd_dispatch(cmd, GROUPS, GROUPS, 1);
}

unsafe fn push<T: bytemuck::Pod>(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    layout: vk::PipelineLayout,
    value: &T,
) {
    device.cmd_push_constants(
        cmd,
        layout,
        vk::ShaderStageFlags::COMPUTE,
        0,
        bytemuck::bytes_of(value),
    );
}

/// Generates the static base spectrum and wave-data textures from noise.
///
/// Runs once per band; only phase evolves afterwards.
pub struct SpectrumPass {
    pipeline: ComputePipeline,
    set_layout: vk::DescriptorSetLayout,
    set: vk::DescriptorSet,
    uniform: GpuBuffer,
}

impl SpectrumPass {
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn new(
        gpu: &GpuContext,
        pool: &DescriptorPool,
        shader_dir: &Path,
        settings: &SpectrumUniform,
        noise: &Texture,
        spectrum: &Texture,
        wave_data: &Texture,
    ) -> Result<Self> {
        let device = gpu.device();

        let set_layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::COMPUTE)
            .storage_image(1, vk::ShaderStageFlags::COMPUTE)
            .storage_image(2, vk::ShaderStageFlags::COMPUTE)
            .storage_image(3, vk::ShaderStageFlags::COMPUTE)
            .build(device)?;

        let uniform = gpu.allocator().lock().create_buffer(
            SpectrumUniform::SIZE as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "wave_spectrum_settings",
        )?;
        uniform.write(std::slice::from_ref(settings))?;

        let set = pool.allocate(device, &[set_layout])?[0];
        write_uniform_buffer(
            device,
            set,
            0,
            uniform.buffer,
            0,
            SpectrumUniform::SIZE as u64,
        );
        write_storage_image(device, set, 1, noise.view(), noise.layout());
        write_storage_image(device, set, 2, spectrum.view(), spectrum.layout());
        write_storage_image(device, set, 3, wave_data.view(), wave_data.layout());

        let pipeline = ComputePipeline::from_path(
            device,
            shader_dir.join("wave_spectrum.comp.spv"),
            &[set_layout],
            std::mem::size_of::<GridPush>() as u32,
        )?;

        Ok(Self {
            pipeline,
            set_layout,
            set,
            uniform,
        })
    }

    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        self.pipeline.bind(device, cmd);
        push(device, cmd, self.pipeline.layout, &GridPush::full());
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[self.set],
            &[],
        );
        dispatch_grid(device, cmd);
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.set_layout, None);
        let _ = gpu.allocator().lock().free_buffer(&mut self.uniform);
    }
}

/// Derives the frequency-mirrored conjugate of the base spectrum.
pub struct ConjugatePass {
    pipeline: ComputePipeline,
    set_layout: vk::DescriptorSetLayout,
    set: vk::DescriptorSet,
}

impl ConjugatePass {
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn new(
        gpu: &GpuContext,
        pool: &DescriptorPool,
        shader_dir: &Path,
        spectrum: &Texture,
        conjugate: &Texture,
    ) -> Result<Self> {
        let device = gpu.device();
        let set_layout = storage_image_layout(device, 2)?;

        let set = pool.allocate(device, &[set_layout])?[0];
        write_storage_image(device, set, 0, spectrum.view(), spectrum.layout());
        write_storage_image(device, set, 1, conjugate.view(), conjugate.layout());

        let pipeline = ComputePipeline::from_path(
            device,
            shader_dir.join("wave_conjugate.comp.spv"),
            &[set_layout],
            std::mem::size_of::<GridPush>() as u32,
        )?;

        Ok(Self {
            pipeline,
            set_layout,
            set,
        })
    }

    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        self.pipeline.bind(device, cmd);
        push(device, cmd, self.pipeline.layout, &GridPush::full());
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[self.set],
            &[],
        );
        dispatch_grid(device, cmd);
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.set_layout, None);
    }
}

/// Advances the complex amplitudes by accumulated time, expanding the
/// spectrum scratch copy into the four frequency-domain fields.
pub struct TimeUpdatePass {
    pipeline: ComputePipeline,
    set_layout: vk::DescriptorSetLayout,
    /// One set per frame in flight (the fields are frame-local).
    sets: Vec<vk::DescriptorSet>,
}

impl TimeUpdatePass {
    /// # Safety
    /// All handles must be valid. `fields` is indexed `[frame][field]`.
    pub unsafe fn new(
        gpu: &GpuContext,
        pool: &DescriptorPool,
        shader_dir: &Path,
        fields: &[[&Texture; FIELD_COUNT]],
        scratch: &[&Texture],
        conjugate: &Texture,
        wave_data: &Texture,
    ) -> Result<Self> {
        let device = gpu.device();
        // Bindings: the four fields, the frame's spectrum scratch (read
        // and advanced in place), the conjugated spectrum, wave data.
        let set_layout = storage_image_layout(device, FIELD_COUNT as u32 + 3)?;

        let layouts = vec![set_layout; fields.len()];
        let sets = pool.allocate(device, &layouts)?;

        for (frame, set) in sets.iter().enumerate() {
            for (i, field) in fields[frame].iter().enumerate() {
                write_storage_image(device, *set, i as u32, field.view(), field.layout());
            }
            let scratch = scratch[frame];
            write_storage_image(
                device,
                *set,
                FIELD_COUNT as u32,
                scratch.view(),
                scratch.layout(),
            );
            write_storage_image(
                device,
                *set,
                FIELD_COUNT as u32 + 1,
                conjugate.view(),
                conjugate.layout(),
            );
            write_storage_image(
                device,
                *set,
                FIELD_COUNT as u32 + 2,
                wave_data.view(),
                wave_data.layout(),
            );
        }

        let pipeline = ComputePipeline::from_path(
            device,
            shader_dir.join("wave_time_update.comp.spv"),
            &[set_layout],
            std::mem::size_of::<TimePush>() as u32,
        )?;

        Ok(Self {
            pipeline,
            set_layout,
            sets,
        })
    }

    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
        time: f32,
    ) {
        self.pipeline.bind(device, cmd);
        let push_data = TimePush {
            resolution: glam::Vec2::splat(crate::RESOLUTION as f32),
            time,
        };
        push(device, cmd, self.pipeline.layout, &push_data);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[self.sets[frame_index]],
            &[],
        );
        dispatch_grid(device, cmd);
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.set_layout, None);
    }
}

/// Transform axis of a butterfly pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftAxis {
    Horizontal,
    Vertical,
}

impl FftAxis {
    fn shader_name(self) -> &'static str {
        match self {
            Self::Horizontal => "wave_ifft_horizontal.comp.spv",
            Self::Vertical => "wave_ifft_vertical.comp.spv",
        }
    }
}

/// One axis of the inverse FFT: the butterfly dispatch, shared by all
/// four fields through per-field descriptor sets.
pub struct IfftPass {
    pipeline: ComputePipeline,
    set_layout: vk::DescriptorSetLayout,
    /// Indexed `[frame][field]`.
    sets: Vec<[vk::DescriptorSet; FIELD_COUNT]>,
}

impl IfftPass {
    /// # Safety
    /// All handles must be valid. `fields` is indexed `[frame][field]`.
    pub unsafe fn new(
        gpu: &GpuContext,
        pool: &DescriptorPool,
        shader_dir: &Path,
        axis: FftAxis,
        fields: &[[&Texture; FIELD_COUNT]],
        scratch: &[&Texture],
        butterfly: &Texture,
    ) -> Result<Self> {
        let device = gpu.device();
        let set_layout = storage_image_layout(device, 3)?;

        let mut sets = Vec::with_capacity(fields.len());
        for (frame, frame_fields) in fields.iter().enumerate() {
            let layouts = [set_layout; FIELD_COUNT];
            let allocated = pool.allocate(device, &layouts)?;
            let mut frame_sets = [vk::DescriptorSet::null(); FIELD_COUNT];
            for (i, (set, field)) in allocated.iter().zip(frame_fields.iter()).enumerate() {
                write_storage_image(device, *set, 0, field.view(), field.layout());
                let scratch = scratch[frame];
                write_storage_image(device, *set, 1, scratch.view(), scratch.layout());
                write_storage_image(device, *set, 2, butterfly.view(), butterfly.layout());
                frame_sets[i] = *set;
            }
            sets.push(frame_sets);
        }

        let pipeline = ComputePipeline::from_path(
            device,
            shader_dir.join(axis.shader_name()),
            &[set_layout],
            std::mem::size_of::<IfftPush>() as u32,
        )?;

        Ok(Self {
            pipeline,
            set_layout,
            sets,
        })
    }

    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
        field: usize,
        ping_pong: bool,
        step: u32,
    ) {
        self.pipeline.bind(device, cmd);
        let push_data = IfftPush {
            resolution: glam::Vec2::splat(crate::RESOLUTION as f32),
            ping_pong: if ping_pong { 1.0 } else { 0.0 },
            step,
        };
        push(device, cmd, self.pipeline.layout, &push_data);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[self.sets[frame_index][field]],
            &[],
        );
        dispatch_grid(device, cmd);
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.set_layout, None);
    }
}

/// In-place bit-reversal reorder of a transformed field.
pub struct PermutePass {
    pipeline: ComputePipeline,
    set_layout: vk::DescriptorSetLayout,
    /// Indexed `[frame][field]`.
    sets: Vec<[vk::DescriptorSet; FIELD_COUNT]>,
}

impl PermutePass {
    /// # Safety
    /// All handles must be valid. `fields` is indexed `[frame][field]`.
    pub unsafe fn new(
        gpu: &GpuContext,
        pool: &DescriptorPool,
        shader_dir: &Path,
        fields: &[[&Texture; FIELD_COUNT]],
    ) -> Result<Self> {
        let device = gpu.device();
        let set_layout = storage_image_layout(device, 1)?;

        let mut sets = Vec::with_capacity(fields.len());
        for frame_fields in fields {
            let layouts = [set_layout; FIELD_COUNT];
            let allocated = pool.allocate(device, &layouts)?;
            let mut frame_sets = [vk::DescriptorSet::null(); FIELD_COUNT];
            for (i, (set, field)) in allocated.iter().zip(frame_fields.iter()).enumerate() {
                write_storage_image(device, *set, 0, field.view(), field.layout());
                frame_sets[i] = *set;
            }
            sets.push(frame_sets);
        }

        let pipeline = ComputePipeline::from_path(
            device,
            shader_dir.join("wave_permute.comp.spv"),
            &[set_layout],
            std::mem::size_of::<GridPush>() as u32,
        )?;

        Ok(Self {
            pipeline,
            set_layout,
            sets,
        })
    }

    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
        field: usize,
    ) {
        self.pipeline.bind(device, cmd);
        push(device, cmd, self.pipeline.layout, &GridPush::full());
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[self.sets[frame_index][field]],
            &[],
        );
        dispatch_grid(device, cmd);
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.set_layout, None);
    }
}

/// Combines the four spatial-domain fields into the displacement,
/// derivative, and turbulence outputs.
pub struct MergePass {
    pipeline: ComputePipeline,
    set_layout: vk::DescriptorSetLayout,
    sets: Vec<vk::DescriptorSet>,
}

impl MergePass {
    /// # Safety
    /// All handles must be valid. `fields` and `outputs` are indexed
    /// `[frame][...]`; outputs are displacement, derivatives, turbulence.
    pub unsafe fn new(
        gpu: &GpuContext,
        pool: &DescriptorPool,
        shader_dir: &Path,
        fields: &[[&Texture; FIELD_COUNT]],
        outputs: &[[&Texture; 3]],
    ) -> Result<Self> {
        let device = gpu.device();
        let set_layout = storage_image_layout(device, FIELD_COUNT as u32 + 3)?;

        let layouts = vec![set_layout; fields.len()];
        let sets = pool.allocate(device, &layouts)?;

        for (frame, set) in sets.iter().enumerate() {
            for (i, field) in fields[frame].iter().enumerate() {
                write_storage_image(device, *set, i as u32, field.view(), field.layout());
            }
            for (i, output) in outputs[frame].iter().enumerate() {
                write_storage_image(
                    device,
                    *set,
                    (FIELD_COUNT + i) as u32,
                    output.view(),
                    output.layout(),
                );
            }
        }

        let pipeline = ComputePipeline::from_path(
            device,
            shader_dir.join("wave_merge.comp.spv"),
            &[set_layout],
            std::mem::size_of::<MergePush>() as u32,
        )?;

        Ok(Self {
            pipeline,
            set_layout,
            sets,
        })
    }

    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
        lambda: f32,
        delta_time: f32,
    ) {
        self.pipeline.bind(device, cmd);
        let push_data = MergePush {
            resolution: glam::Vec2::splat(crate::RESOLUTION as f32),
            lambda,
            delta_time,
        };
        push(device, cmd, self.pipeline.layout, &push_data);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline.layout,
            0,
            &[self.sets[frame_index]],
            &[],
        );
        dispatch_grid(device, cmd);
    }

    /// # Safety
    /// The pass must not be in use.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.set_layout, None);
    }
}
