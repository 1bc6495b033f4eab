//! The three-band ocean generator.

use crate::band::{BandParams, WaveBand};
use crate::RESOLUTION;
use ash::vk;
use mareld_gpu::command::CommandPool;
use mareld_gpu::{GpuContext, Result};
use std::path::Path;

/// Owns the wave bands and drives their per-frame recording.
///
/// Registered with the renderer as a pre-processing effect; records into
/// the frame's pre-processing command buffer only.
pub struct OceanGenerator {
    bands: Vec<WaveBand>,
    time: f32,
    initialized: bool,
}

impl OceanGenerator {
    /// Create the standard three-band cascade.
    ///
    /// `noise` is shared by all bands: `RESOLUTION^2` RG float pairs of
    /// Gaussian noise, loaded from the precomputed table asset.
    pub fn new(
        gpu: &GpuContext,
        cmd_pool: &CommandPool,
        shader_dir: &Path,
        noise: &[f32],
        frames_in_flight: usize,
    ) -> Result<Self> {
        let bands = BandParams::cascade()
            .into_iter()
            .map(|params| WaveBand::new(gpu, cmd_pool, shader_dir, params, noise, frames_in_flight))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bands,
            time: 0.0,
            initialized: false,
        })
    }

    /// Record all bands' dispatch graphs for this frame.
    ///
    /// The first call additionally records spectrum generation; the
    /// static spectrum is never regenerated after that.
    ///
    /// # Safety
    /// The command buffer must be recording and owned by `frame_index`.
    pub unsafe fn record(
        &mut self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
        delta_time: f32,
    ) -> Result<()> {
        self.time += delta_time;
        let generate = !self.initialized;

        for band in &mut self.bands {
            band.record(device, cmd, frame_index, self.time, delta_time, generate)?;
        }

        self.initialized = true;
        Ok(())
    }

    /// The wave bands, in cascade order.
    pub fn bands(&self) -> &[WaveBand] {
        &self.bands
    }

    /// Accumulated simulation time in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Length of the noise field every band expects.
    pub fn noise_len() -> usize {
        (RESOLUTION * RESOLUTION * 2) as usize
    }

    /// Destroy all bands.
    ///
    /// # Safety
    /// No band may be referenced by in-flight GPU work.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        for band in &mut self.bands {
            band.destroy(gpu);
        }
        self.bands.clear();
    }
}
