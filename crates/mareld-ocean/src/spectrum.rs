//! JONSWAP wave spectrum parameters.
//!
//! The spectrum shader blends two JONSWAP components (e.g. local wind sea
//! plus distant swell) evaluated per frequency bin. The parameter block
//! is uploaded once per band into a uniform buffer; only the phase of the
//! resulting amplitudes evolves per frame.

use glam::Vec2;

const GRAVITY: f32 = 9.81;

/// One JONSWAP spectrum component.
///
/// Uploaded verbatim; layout must match the shader's uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpectrumComponent {
    /// Blend weight of this component.
    pub scale: f32,
    /// Dominant wind direction, radians.
    pub angle: f32,
    /// Directional spread blend factor.
    pub spread_blend: f32,
    /// Swell contribution, clamped to [0.01, 1].
    pub swell: f32,
    /// JONSWAP alpha (energy scale), from fetch and wind speed.
    pub alpha: f32,
    /// Angular frequency of the spectral peak.
    pub peak_omega: f32,
    /// Peak sharpening factor.
    pub gamma: f32,
    /// Exponential fade of wavelengths shorter than this.
    pub short_waves_fade: f32,
}

impl SpectrumComponent {
    /// Build a component from physical wind parameters.
    pub fn from_wind(scale: f32, angle_deg: f32, swell: f32, fetch: f32, wind_speed: f32) -> Self {
        Self {
            scale,
            angle: angle_deg.to_radians(),
            spread_blend: 1.0,
            swell: swell.clamp(0.01, 1.0),
            alpha: jonswap_alpha(GRAVITY, fetch, wind_speed),
            peak_omega: jonswap_peak_frequency(GRAVITY, fetch, wind_speed),
            gamma: 3.3,
            short_waves_fade: 0.01,
        }
    }
}

/// Uniform block consumed by the spectrum generation shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpectrumUniform {
    pub components: [SpectrumComponent; 2],
    pub length_scale: f32,
    pub cutoff_low: f32,
    pub cutoff_high: f32,
    pub size: u32,
}

impl SpectrumUniform {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// The engine's standard two-component sea state: a light local wind
    /// sea plus a disabled second slot kept for artistic tuning.
    pub fn sea_state(length_scale: f32, cutoff_low: f32, cutoff_high: f32) -> Self {
        Self {
            components: [
                SpectrumComponent::from_wind(0.5, -29.81, 0.198, 100_000.0, 0.5),
                SpectrumComponent::from_wind(0.0, 0.0, 1.0, 300_000.0, 1.0),
            ],
            length_scale,
            cutoff_low,
            cutoff_high,
            size: crate::RESOLUTION,
        }
    }
}

/// JONSWAP energy-scale parameter.
///
/// `alpha = 0.076 * (g * fetch / U^2)^-0.22`
pub fn jonswap_alpha(gravity: f32, fetch: f32, wind_speed: f32) -> f32 {
    0.076 * (gravity * fetch / wind_speed / wind_speed).powf(-0.22)
}

/// Angular frequency of the JONSWAP spectral peak.
///
/// `omega_p = 22 * (U * fetch / g^2)^-0.33`
pub fn jonswap_peak_frequency(gravity: f32, fetch: f32, wind_speed: f32) -> f32 {
    22.0 * (wind_speed * fetch / gravity / gravity).powf(-0.33)
}

/// Push constants shared by the simple full-grid passes.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridPush {
    pub resolution: Vec2,
}

impl GridPush {
    pub fn full() -> Self {
        Self {
            resolution: Vec2::splat(crate::RESOLUTION as f32),
        }
    }
}

/// Push constants of the time-update pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TimePush {
    pub resolution: Vec2,
    pub time: f32,
}

/// Push constants of the butterfly passes.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct IfftPush {
    pub resolution: Vec2,
    /// 1.0 reads the field texture, 0.0 reads the scratch texture.
    pub ping_pong: f32,
    pub step: u32,
}

/// Push constants of the merge pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MergePush {
    pub resolution: Vec2,
    /// Horizontal displacement damping.
    pub lambda: f32,
    pub delta_time: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn jonswap_alpha_matches_closed_form() {
        // 0.076 * (9.81 * 100000 / 0.25)^-0.22
        let alpha = jonswap_alpha(9.81, 100_000.0, 0.5);
        let expected = 0.076 * (9.81f32 * 100_000.0 / 0.25).powf(-0.22);
        assert_relative_eq!(alpha, expected);
        // Stronger wind concentrates more energy.
        assert!(jonswap_alpha(9.81, 100_000.0, 2.0) > alpha);
    }

    #[test]
    fn peak_frequency_decreases_with_wind() {
        let calm = jonswap_peak_frequency(9.81, 100_000.0, 0.5);
        let windy = jonswap_peak_frequency(9.81, 100_000.0, 5.0);
        assert!(windy < calm);
        assert!(calm > 0.0);
    }

    #[test]
    fn swell_is_clamped() {
        let c = SpectrumComponent::from_wind(1.0, 0.0, 0.0, 100_000.0, 1.0);
        assert_relative_eq!(c.swell, 0.01);
        let c = SpectrumComponent::from_wind(1.0, 0.0, 7.0, 100_000.0, 1.0);
        assert_relative_eq!(c.swell, 1.0);
    }

    #[test]
    fn uniform_layout_matches_shader_block() {
        // Two 32-byte components followed by four scalars.
        assert_eq!(std::mem::size_of::<SpectrumComponent>(), 32);
        assert_eq!(SpectrumUniform::SIZE, 80);
        assert_eq!(std::mem::offset_of!(SpectrumUniform, length_scale), 64);
        assert_eq!(std::mem::offset_of!(SpectrumUniform, size), 76);
    }

    #[test]
    fn push_constant_sizes() {
        assert_eq!(std::mem::size_of::<GridPush>(), 8);
        assert_eq!(std::mem::size_of::<TimePush>(), 12);
        assert_eq!(std::mem::size_of::<IfftPush>(), 16);
        assert_eq!(std::mem::size_of::<MergePush>(), 16);
    }
}
