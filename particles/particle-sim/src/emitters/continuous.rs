//! Steady stream of particles

use std::any::Any;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::operator::{Emitter, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// Emission rate and active window
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct ContinuousEmitterConfig {
    /// Particles per second at full strength
    pub emission_rate: f32,
    /// Seconds of emission, 0 for no end
    pub duration: f32,
    pub start_time: f32,
}

impl Default for ContinuousEmitterConfig {
    fn default() -> Self {
        Self {
            emission_rate: 100.0,
            duration: 0.0,
            start_time: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct EmissionCarry {
    fraction: f32,
}

/// Spawns particles at a fixed rate, carrying fractional particles between
/// steps and spreading creation times over the step
#[derive(Debug, Clone, Default)]
pub struct ContinuousEmitter {
    config: ContinuousEmitterConfig,
}

impl ContinuousEmitter {
    pub fn new(config: ContinuousEmitterConfig) -> Self {
        Self { config }
    }

    fn end_time(&self) -> f32 {
        if self.config.duration > 0.0 {
            self.config.start_time + self.config.duration
        } else {
            f32::INFINITY
        }
    }
}

impl OperatorInfo for ContinuousEmitter {
    fn name(&self) -> &'static str {
        "Emit Continuously"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME
    }

    fn create_context(&self) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(EmissionCarry::default()))
    }
}

impl Emitter for ContinuousEmitter {
    fn emit(
        &self,
        state: &mut ParticleState,
        strength: f32,
        ctx: &mut OperatorContext<'_>,
    ) -> AttributeMask {
        let Some(carry) = ctx.data_mut::<EmissionCarry>() else {
            return AttributeMask::empty();
        };
        let clock = state.clock;
        let from = (clock.cur_time - clock.dt).max(self.config.start_time);
        let to = clock.cur_time.min(self.end_time());
        if to <= from {
            return AttributeMask::empty();
        }

        carry.fraction += (to - from) * self.config.emission_rate * strength;
        let whole = carry.fraction.floor();
        carry.fraction -= whole;
        let count = whole as usize;
        if count == 0 {
            return AttributeMask::empty();
        }

        let spawned = state.spawn(count);
        for (i, particle) in spawned.enumerate() {
            let t = (i + 1) as f32 / count as f32;
            state.store.set_float(
                ParticleAttribute::CreationTime,
                particle,
                from + (to - from) * t,
            );
        }
        AttributeMask::CREATION_TIME
    }

    fn may_create_more_particles(
        &self,
        state: &ParticleState,
        _data: Option<&(dyn Any + Send + Sync + 'static)>,
    ) -> bool {
        self.is_infinite() || state.clock.cur_time < self.end_time()
    }

    fn is_infinite(&self) -> bool {
        self.config.duration <= 0.0
    }

    fn skip_to_time(&self, _state: &ParticleState, ctx: &mut OperatorContext<'_>) {
        if let Some(carry) = ctx.data_mut::<EmissionCarry>() {
            carry.fraction = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(
        emitter: &ContinuousEmitter,
        state: &mut ParticleState,
        data: &mut Box<dyn Any + Send + Sync>,
        dt: f32,
    ) -> AttributeMask {
        state.clock.dt = dt;
        state.clock.cur_time += dt;
        let mut ctx = OperatorContext::new(Some(data.as_mut()), None, false);
        emitter.emit(state, 1.0, &mut ctx)
    }

    #[test]
    fn test_fraction_carries_over() {
        let emitter = ContinuousEmitter::new(ContinuousEmitterConfig {
            emission_rate: 2.0,
            ..Default::default()
        });
        let mut data = emitter.create_context().unwrap();
        let mut state = ParticleState::for_tests(AttributeMask::empty(), 64);

        // 0.25 particles per step
        for _ in 0..3 {
            step(&emitter, &mut state, &mut data, 0.125);
        }
        assert_eq!(state.active(), 0);
        let mask = step(&emitter, &mut state, &mut data, 0.125);
        assert_eq!(state.active(), 1);
        assert_eq!(mask, AttributeMask::CREATION_TIME);
    }

    #[test]
    fn test_creation_times_spread_over_step() {
        let emitter = ContinuousEmitter::new(ContinuousEmitterConfig {
            emission_rate: 32.0,
            ..Default::default()
        });
        let mut data = emitter.create_context().unwrap();
        let mut state = ParticleState::for_tests(AttributeMask::empty(), 64);
        step(&emitter, &mut state, &mut data, 0.125);
        assert_eq!(state.active(), 4);
        let times: Vec<f32> = (0..4)
            .map(|p| state.store.float(ParticleAttribute::CreationTime, p))
            .collect();
        for (time, expected) in times.iter().zip([0.03125, 0.0625, 0.09375, 0.125]) {
            assert!((time - expected).abs() < 1e-6, "{times:?}");
        }
    }

    #[test]
    fn test_window_limits_emission() {
        let emitter = ContinuousEmitter::new(ContinuousEmitterConfig {
            emission_rate: 10.0,
            duration: 1.0,
            start_time: 0.5,
        });
        let mut data = emitter.create_context().unwrap();
        let mut state = ParticleState::for_tests(AttributeMask::empty(), 64);
        step(&emitter, &mut state, &mut data, 1.0);
        assert_eq!(state.active(), 5);
        step(&emitter, &mut state, &mut data, 1.0);
        assert_eq!(state.active(), 10);
        assert!(!emitter.may_create_more_particles(&state, None));
        step(&emitter, &mut state, &mut data, 1.0);
        assert_eq!(state.active(), 10);
        assert!(!emitter.is_infinite());
    }
}
