//! Operators driven by particle age

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::config::{fade_in_out, remap};
use crate::operator::{Operator, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

use super::life_fraction;

/// Fade durations as fractions of the particle lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct AlphaFadeConfig {
    pub fade_in: f32,
    pub fade_out: f32,
}

impl Default for AlphaFadeConfig {
    fn default() -> Self {
        Self {
            fade_in: 0.25,
            fade_out: 0.25,
        }
    }
}

/// Ramps alpha up from 0 after spawn and back to 0 before death, relative
/// to the spawn-time alpha
#[derive(Debug, Clone, Default)]
pub struct AlphaFade {
    config: AlphaFadeConfig,
}

impl AlphaFade {
    pub fn new(config: AlphaFadeConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for AlphaFade {
    fn name(&self) -> &'static str {
        "Alpha Fade In and Out"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::ALPHA
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME | AttributeMask::LIFE_DURATION | AttributeMask::ALPHA
    }

    fn read_initial_attributes(&self) -> AttributeMask {
        AttributeMask::ALPHA
    }
}

impl Operator for AlphaFade {
    fn operate(&self, state: &mut ParticleState, strength: f32, _ctx: &mut OperatorContext<'_>) {
        let fade_in = self.config.fade_in.clamp(0.0, 1.0);
        let fade_out_start = (1.0 - self.config.fade_out).max(fade_in);
        for particle in 0..state.active() {
            let t = life_fraction(state, particle);
            let envelope = fade_in_out(0.0, fade_in, fade_out_start, 1.0, t);
            let initial = state.store.initial_float(ParticleAttribute::Alpha, particle);
            // blend towards the untouched alpha when the operator is fading
            let alpha = initial * (1.0 + (envelope - 1.0) * strength);
            state.store.set_float(ParticleAttribute::Alpha, particle, alpha);
        }
    }
}

/// Radius multipliers over the lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RadiusScaleConfig {
    /// Life fraction where scaling starts
    pub start_time: f32,
    /// Life fraction where scaling ends
    pub end_time: f32,
    pub start_scale: f32,
    pub end_scale: f32,
}

impl Default for RadiusScaleConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 1.0,
            start_scale: 1.0,
            end_scale: 1.0,
        }
    }
}

/// Scales the spawn-time radius over the particle's life
#[derive(Debug, Clone, Default)]
pub struct RadiusScale {
    config: RadiusScaleConfig,
}

impl RadiusScale {
    pub fn new(config: RadiusScaleConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for RadiusScale {
    fn name(&self) -> &'static str {
        "Radius Scale"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::RADIUS
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME | AttributeMask::LIFE_DURATION | AttributeMask::RADIUS
    }

    fn read_initial_attributes(&self) -> AttributeMask {
        AttributeMask::RADIUS
    }
}

impl Operator for RadiusScale {
    fn operate(&self, state: &mut ParticleState, strength: f32, _ctx: &mut OperatorContext<'_>) {
        let config = &self.config;
        for particle in 0..state.active() {
            let t = life_fraction(state, particle).clamp(config.start_time, config.end_time);
            let scale = remap(t, config.start_time, config.end_time, config.start_scale, config.end_scale);
            let scale = 1.0 + (scale - 1.0) * strength;
            let initial = state.store.initial_float(ParticleAttribute::Radius, particle);
            state
                .store
                .set_float(ParticleAttribute::Radius, particle, initial * scale);
        }
    }
}

/// Spin rates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RotationSpinConfig {
    /// Roll added to every particle, degrees per second
    pub spin_rate_degrees: f32,
    /// Also add each particle's own `ROTATION_SPEED` (radians per second)
    pub use_rotation_speed: bool,
}

/// Advances the roll of every particle
#[derive(Debug, Clone, Default)]
pub struct RotationSpin {
    config: RotationSpinConfig,
}

impl RotationSpin {
    pub fn new(config: RotationSpinConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for RotationSpin {
    fn name(&self) -> &'static str {
        "Rotation Spin Roll"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::ROTATION
    }

    fn read_attributes(&self) -> AttributeMask {
        let mut mask = AttributeMask::ROTATION;
        if self.config.use_rotation_speed {
            mask |= AttributeMask::ROTATION_SPEED;
        }
        mask
    }
}

impl Operator for RotationSpin {
    fn operate(&self, state: &mut ParticleState, strength: f32, _ctx: &mut OperatorContext<'_>) {
        let dt = state.clock.dt * strength;
        let constant = self.config.spin_rate_degrees.to_radians();
        for particle in 0..state.active() {
            let mut rate = constant;
            if self.config.use_rotation_speed {
                rate += state.store.float(ParticleAttribute::RotationSpeed, particle);
            }
            let rotation = state.store.float(ParticleAttribute::Rotation, particle) + rate * dt;
            state
                .store
                .set_float(ParticleAttribute::Rotation, particle, rotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(mask: AttributeMask, lifetimes: &[f32]) -> ParticleState {
        let mut state = ParticleState::for_tests(mask | AttributeMask::LIFE_DURATION, 16);
        state.clock.cur_time = 1.0;
        state.clock.dt = 0.5;
        state.spawn(lifetimes.len());
        for (particle, lifetime) in lifetimes.iter().enumerate() {
            state
                .store
                .set_float(ParticleAttribute::LifeDuration, particle, *lifetime);
        }
        state
    }

    #[test]
    fn test_alpha_envelope() {
        // life fractions 0.1, 0.5, 0.9
        let mut state = state(AttributeMask::ALPHA, &[10.0, 2.0, 1.0 / 0.9]);
        for particle in 0..3 {
            state.store.set_float(ParticleAttribute::Alpha, particle, 0.8);
        }
        AlphaFade::default().operate(&mut state, 1.0, &mut OperatorContext::detached());
        let alphas: Vec<f32> = (0..3)
            .map(|p| state.store.float(ParticleAttribute::Alpha, p))
            .collect();
        assert!((alphas[0] - 0.32).abs() < 1e-4, "{alphas:?}");
        assert!((alphas[1] - 0.8).abs() < 1e-4, "{alphas:?}");
        assert!((alphas[2] - 0.32).abs() < 1e-4, "{alphas:?}");
    }

    #[test]
    fn test_radius_scales_over_life() {
        let mut state = state(AttributeMask::RADIUS, &[2.0, 0.5]);
        for particle in 0..2 {
            state.store.set_float(ParticleAttribute::Radius, particle, 4.0);
        }
        let scale = RadiusScale::new(RadiusScaleConfig {
            start_scale: 1.0,
            end_scale: 3.0,
            ..Default::default()
        });
        scale.operate(&mut state, 1.0, &mut OperatorContext::detached());
        assert!((state.store.float(ParticleAttribute::Radius, 0) - 8.0).abs() < 1e-5);
        // past the end of life the scale holds at the end value
        assert!((state.store.float(ParticleAttribute::Radius, 1) - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_spin_adds_rate() {
        let mut state = state(
            AttributeMask::ROTATION | AttributeMask::ROTATION_SPEED,
            &[1.0],
        );
        state
            .store
            .set_float(ParticleAttribute::RotationSpeed, 0, 2.0);
        let spin = RotationSpin::new(RotationSpinConfig {
            spin_rate_degrees: 180.0,
            use_rotation_speed: true,
        });
        spin.operate(&mut state, 1.0, &mut OperatorContext::detached());
        let expected = (std::f32::consts::PI + 2.0) * 0.5;
        assert!((state.store.float(ParticleAttribute::Rotation, 0) - expected).abs() < 1e-5);
    }
}
