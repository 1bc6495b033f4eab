//! One wave band: textures plus the per-frame dispatch graph.

use crate::butterfly::{self, PingPong};
use crate::passes::{
    ConjugatePass, FftAxis, IfftPass, MergePass, PermutePass, SpectrumPass, TimeUpdatePass,
};
use crate::spectrum::SpectrumUniform;
use crate::{FIELD_COUNT, LOG_SIZE, RESOLUTION};
use ash::vk;
use mareld_gpu::barrier::full_memory_barrier;
use mareld_gpu::command::CommandPool;
use mareld_gpu::descriptors::DescriptorPool;
use mareld_gpu::texture::Texture;
use mareld_gpu::{GpuContext, Result, TextureArena, TextureHandle};
use std::path::Path;

/// Horizontal displacement damping fed to the merge pass.
const LAMBDA: f32 = 1.0;

/// Spatial scale and spectral window of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandParams {
    /// Patch size in world units.
    pub length_scale: f32,
    /// Lowest wave number kept by this band.
    pub cutoff_low: f32,
    /// Highest wave number kept by this band.
    pub cutoff_high: f32,
}

impl BandParams {
    /// The engine's standard three-band cascade: broad swell, mid chop,
    /// fine ripple. Cutoffs tile the wave-number line without overlap so
    /// no wavelength is counted twice.
    pub fn cascade() -> [Self; 3] {
        [
            Self {
                length_scale: 250.0,
                cutoff_low: 0.0001,
                cutoff_high: 2.2,
            },
            Self {
                length_scale: 17.0,
                cutoff_low: 2.2,
                cutoff_high: 5.8,
            },
            Self {
                length_scale: 5.0,
                cutoff_low: 5.8,
                cutoff_high: 10.7,
            },
        ]
    }
}

/// Compute dispatches recorded per band per frame: one time update, per
/// field the two butterfly half-sequences plus its permute, one merge.
/// (The spectrum scratch copy is a transfer, not a dispatch.)
pub const DISPATCHES_PER_FRAME: usize = 1 + FIELD_COUNT * (2 * LOG_SIZE as usize + 1) + 1;

/// One instance of the ocean FFT pipeline.
///
/// Owns every texture it reads or writes through an arena, and all the
/// compute passes. Static textures (spectrum, conjugate, wave data,
/// noise, butterfly table) are single instances; everything the graph
/// writes per frame is duplicated per frame in flight.
pub struct WaveBand {
    params: BandParams,
    arena: TextureArena,
    descriptor_pool: DescriptorPool,

    spectrum: TextureHandle,
    scratch: Vec<TextureHandle>,
    fields: Vec<[TextureHandle; FIELD_COUNT]>,
    outputs: Vec<[TextureHandle; 3]>,

    spectrum_pass: SpectrumPass,
    conjugate_pass: ConjugatePass,
    time_update: TimeUpdatePass,
    horizontal_ifft: IfftPass,
    vertical_ifft: IfftPass,
    permute: PermutePass,
    merge: MergePass,
}

impl WaveBand {
    /// Create the band's textures and passes.
    ///
    /// `noise` is the Gaussian noise field driving spectrum generation:
    /// `RESOLUTION * RESOLUTION * 2` floats.
    pub fn new(
        gpu: &GpuContext,
        cmd_pool: &CommandPool,
        shader_dir: &Path,
        params: BandParams,
        noise: &[f32],
        frames_in_flight: usize,
    ) -> Result<Self> {
        assert_eq!(
            noise.len(),
            (RESOLUTION * RESOLUTION * 2) as usize,
            "noise field must be RESOLUTION^2 RG pairs"
        );

        let tag = params.length_scale as u32;
        let mut arena = TextureArena::new();

        let rg = vk::Format::R32G32_SFLOAT;
        let rgba = vk::Format::R32G32B32A32_SFLOAT;
        let side = RESOLUTION;

        let spectrum = arena.insert(Texture::storage(
            gpu,
            cmd_pool,
            side,
            side,
            rg,
            &format!("wave{tag}_spectrum"),
        )?);
        let wave_data = arena.insert(Texture::storage(
            gpu,
            cmd_pool,
            side,
            side,
            rgba,
            &format!("wave{tag}_data"),
        )?);
        let conjugate = arena.insert(Texture::storage(
            gpu,
            cmd_pool,
            side,
            side,
            rgba,
            &format!("wave{tag}_conjugate"),
        )?);
        let noise_texture = arena.insert(Texture::storage_with_data(
            gpu,
            cmd_pool,
            side,
            side,
            rg,
            bytemuck::cast_slice(noise),
            &format!("wave{tag}_noise"),
        )?);

        let table = butterfly::precompute_table();
        let butterfly_texture = arena.insert(Texture::storage_with_data(
            gpu,
            cmd_pool,
            LOG_SIZE,
            side,
            rgba,
            bytemuck::cast_slice(&table),
            &format!("wave{tag}_butterfly"),
        )?);

        let mut scratch = Vec::with_capacity(frames_in_flight);
        let mut fields = Vec::with_capacity(frames_in_flight);
        let mut outputs = Vec::with_capacity(frames_in_flight);
        for frame in 0..frames_in_flight {
            scratch.push(arena.insert(Texture::storage(
                gpu,
                cmd_pool,
                side,
                side,
                rg,
                &format!("wave{tag}_scratch_{frame}"),
            )?));

            let mut frame_fields = [TextureHandle::default(); FIELD_COUNT];
            for (i, name) in ["dx_dz", "dy_dxz", "dyx_dyz", "dxx_dzz"].iter().enumerate() {
                frame_fields[i] = arena.insert(Texture::storage(
                    gpu,
                    cmd_pool,
                    side,
                    side,
                    rg,
                    &format!("wave{tag}_{name}_{frame}"),
                )?);
            }
            fields.push(frame_fields);

            let mut frame_outputs = [TextureHandle::default(); 3];
            for (i, name) in ["displacement", "derivatives", "turbulence"]
                .iter()
                .enumerate()
            {
                frame_outputs[i] = arena.insert(Texture::storage(
                    gpu,
                    cmd_pool,
                    side,
                    side,
                    rgba,
                    &format!("wave{tag}_{name}_{frame}"),
                )?);
            }
            outputs.push(frame_outputs);
        }

        let descriptor_pool = unsafe { Self::create_descriptor_pool(gpu, frames_in_flight)? };

        // Resolve handle arrays into reference arrays for descriptor
        // creation; the passes capture views, not borrows.
        let field_refs: Vec<[&Texture; FIELD_COUNT]> = fields
            .iter()
            .map(|f| {
                [
                    arena.get(f[0]).expect("live"),
                    arena.get(f[1]).expect("live"),
                    arena.get(f[2]).expect("live"),
                    arena.get(f[3]).expect("live"),
                ]
            })
            .collect();
        let scratch_refs: Vec<&Texture> = scratch
            .iter()
            .map(|&h| arena.get(h).expect("live"))
            .collect();
        let output_refs: Vec<[&Texture; 3]> = outputs
            .iter()
            .map(|o| {
                [
                    arena.get(o[0]).expect("live"),
                    arena.get(o[1]).expect("live"),
                    arena.get(o[2]).expect("live"),
                ]
            })
            .collect();

        let settings =
            SpectrumUniform::sea_state(params.length_scale, params.cutoff_low, params.cutoff_high);

        let (spectrum_pass, conjugate_pass, time_update, horizontal_ifft, vertical_ifft, permute, merge) = unsafe {
            let spectrum_tex = arena.get(spectrum)?;
            let wave_data_tex = arena.get(wave_data)?;
            let conjugate_tex = arena.get(conjugate)?;
            let noise_tex = arena.get(noise_texture)?;
            let butterfly_tex = arena.get(butterfly_texture)?;

            (
                SpectrumPass::new(
                    gpu,
                    &descriptor_pool,
                    shader_dir,
                    &settings,
                    noise_tex,
                    spectrum_tex,
                    wave_data_tex,
                )?,
                ConjugatePass::new(gpu, &descriptor_pool, shader_dir, spectrum_tex, conjugate_tex)?,
                TimeUpdatePass::new(
                    gpu,
                    &descriptor_pool,
                    shader_dir,
                    &field_refs,
                    &scratch_refs,
                    conjugate_tex,
                    wave_data_tex,
                )?,
                IfftPass::new(
                    gpu,
                    &descriptor_pool,
                    shader_dir,
                    FftAxis::Horizontal,
                    &field_refs,
                    &scratch_refs,
                    butterfly_tex,
                )?,
                IfftPass::new(
                    gpu,
                    &descriptor_pool,
                    shader_dir,
                    FftAxis::Vertical,
                    &field_refs,
                    &scratch_refs,
                    butterfly_tex,
                )?,
                PermutePass::new(gpu, &descriptor_pool, shader_dir, &field_refs)?,
                MergePass::new(gpu, &descriptor_pool, shader_dir, &field_refs, &output_refs)?,
            )
        };

        tracing::info!(
            "Wave band created: length scale {}, cutoffs [{}, {}]",
            params.length_scale,
            params.cutoff_low,
            params.cutoff_high
        );

        Ok(Self {
            params,
            arena,
            descriptor_pool,
            spectrum,
            scratch,
            fields,
            outputs,
            spectrum_pass,
            conjugate_pass,
            time_update,
            horizontal_ifft,
            vertical_ifft,
            permute,
            merge,
        })
    }

    unsafe fn create_descriptor_pool(
        gpu: &GpuContext,
        frames_in_flight: usize,
    ) -> Result<DescriptorPool> {
        let n = frames_in_flight as u32;
        let fields = FIELD_COUNT as u32;
        // spectrum + conjugate are single sets; time update and merge are
        // per frame; both IFFT axes and the permute are per frame per field.
        let max_sets = 2 + 2 * n + 3 * n * fields;
        let storage_images =
            // spectrum(3) + conjugate(2)
            5
            // time update: fields + scratch + conjugate + wave data
            + n * (fields + 3)
            // both IFFT axes: field + scratch + butterfly
            + 2 * n * fields * 3
            // permute: field
            + n * fields
            // merge: fields + three outputs
            + n * (fields + 3);

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(storage_images),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1),
        ];

        DescriptorPool::new(gpu.device(), max_sets, &pool_sizes)
    }

    /// Record the band's full dispatch graph for one frame.
    ///
    /// `generate_spectrum` is true exactly once, on the first recorded
    /// frame: the static spectrum and its conjugate never change after
    /// that, only phase does.
    ///
    /// Every dependency is a full barrier. The API is free to overlap
    /// dispatches otherwise, and each butterfly pass reads the previous
    /// pass's output.
    ///
    /// # Safety
    /// The command buffer must be recording and the frame slot's fence
    /// must have been waited.
    pub unsafe fn record(
        &mut self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
        time: f32,
        delta_time: f32,
        generate_spectrum: bool,
    ) -> Result<()> {
        if generate_spectrum {
            self.spectrum_pass.record(device, cmd);
            full_memory_barrier(device, cmd);
            self.conjugate_pass.record(device, cmd);
            full_memory_barrier(device, cmd);
        }

        // Frame-local copy of the static spectrum: the time update
        // advances it in place while the previous frame may still be
        // reading the shared texture.
        let (spectrum, scratch) = self
            .arena
            .get_pair_mut(self.spectrum, self.scratch[frame_index])?;
        Texture::record_copy(device, cmd, spectrum, scratch)?;

        full_memory_barrier(device, cmd);
        self.time_update.record(device, cmd, frame_index, time);

        for field in 0..FIELD_COUNT {
            // The flag flips before every dispatch and runs uninterrupted
            // across the horizontal and vertical halves; resetting it
            // between them (or not resetting per field) silently corrupts
            // the transform.
            let mut ping_pong = PingPong::start();

            for step in 0..LOG_SIZE {
                full_memory_barrier(device, cmd);
                self.horizontal_ifft.record(
                    device,
                    cmd,
                    frame_index,
                    field,
                    ping_pong.flip(),
                    step,
                );
            }
            for step in 0..LOG_SIZE {
                full_memory_barrier(device, cmd);
                self.vertical_ifft.record(
                    device,
                    cmd,
                    frame_index,
                    field,
                    ping_pong.flip(),
                    step,
                );
            }

            full_memory_barrier(device, cmd);
            self.permute.record(device, cmd, frame_index, field);
        }

        full_memory_barrier(device, cmd);
        self.merge
            .record(device, cmd, frame_index, LAMBDA, delta_time);

        Ok(())
    }

    /// Band parameters.
    pub fn params(&self) -> &BandParams {
        &self.params
    }

    /// The displacement, derivative, and turbulence textures of one frame
    /// slot, for the water surface's descriptor sets.
    pub fn output_textures(&self, frame_index: usize) -> Result<[&Texture; 3]> {
        let handles = self.outputs[frame_index];
        Ok([
            self.arena.get(handles[0])?,
            self.arena.get(handles[1])?,
            self.arena.get(handles[2])?,
        ])
    }

    /// Output handles of one frame slot.
    pub fn output_handles(&self, frame_index: usize) -> [TextureHandle; 3] {
        self.outputs[frame_index]
    }

    /// Number of frame slots this band was built for.
    pub fn frames_in_flight(&self) -> usize {
        self.fields.len()
    }

    /// Destroy all GPU resources.
    ///
    /// # Safety
    /// The band must not be referenced by in-flight GPU work.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.spectrum_pass.destroy(gpu);
        self.conjugate_pass.destroy(gpu);
        self.time_update.destroy(gpu);
        self.horizontal_ifft.destroy(gpu);
        self.vertical_ifft.destroy(gpu);
        self.permute.destroy(gpu);
        self.merge.destroy(gpu);
        self.descriptor_pool.destroy(gpu.device());
        self.arena.destroy_all(gpu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_accounting() {
        // 1 time update + 4 * (9 horizontal + 9 vertical + 1 permute)
        // + 1 merge.
        assert_eq!(DISPATCHES_PER_FRAME, 78);
    }

    #[test]
    fn cascade_tiles_the_wave_number_line() {
        let bands = BandParams::cascade();
        assert_eq!(bands.len(), 3);
        // Adjacent cutoffs meet exactly; length scales strictly decrease.
        assert_eq!(bands[0].cutoff_high, bands[1].cutoff_low);
        assert_eq!(bands[1].cutoff_high, bands[2].cutoff_low);
        assert!(bands[0].length_scale > bands[1].length_scale);
        assert!(bands[1].length_scale > bands[2].length_scale);
    }
}
