//! GPU ocean wave simulation for the Mareld engine.
//!
//! Synthesizes ocean surface displacement, derivative, and turbulence
//! fields by inverse-transforming an animated JONSWAP wave spectrum on
//! the GPU. The transform is a sequence of compute dispatches: per
//! frequency-domain field, nine horizontal butterfly passes, nine
//! vertical butterfly passes, and a bit-reversal permute, every
//! dependency fenced with a full barrier.
//!
//! Three wave bands at different length scales run the same pipeline and
//! are composited by the water surface shader.

pub mod band;
pub mod butterfly;
pub mod generator;
pub mod passes;
pub mod spectrum;

pub use band::{BandParams, WaveBand};
pub use butterfly::PingPong;
pub use generator::OceanGenerator;
pub use spectrum::SpectrumComponent;

/// Simulation grid resolution per axis. Fixed: the butterfly table, the
/// dispatch counts, and the shaders all assume it.
pub const RESOLUTION: u32 = 512;

/// log2(RESOLUTION): butterfly passes per axis.
pub const LOG_SIZE: u32 = 9;

/// Compute workgroup edge; shaders declare local_size_x/y of this.
pub const WORKGROUP: u32 = 32;

/// Dispatch group count per axis covering the full grid.
pub const GROUPS: u32 = RESOLUTION.div_ceil(WORKGROUP);

/// Frequency-domain fields produced by the time update: `Dx_Dz`,
/// `Dy_Dxz`, `Dyx_Dyz`, `Dxx_Dzz`.
pub const FIELD_COUNT: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_grid_exactly() {
        assert_eq!(GROUPS, 16);
        assert_eq!(GROUPS * WORKGROUP, RESOLUTION);
    }

    #[test]
    fn log_size_matches_resolution() {
        assert_eq!(1u32 << LOG_SIZE, RESOLUTION);
    }
}
