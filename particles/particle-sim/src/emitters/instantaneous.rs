//! One burst of particles

use std::any::Any;

use crate::attributes::AttributeMask;
use crate::operator::{Emitter, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// Burst size and time
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct InstantaneousEmitterConfig {
    /// Particles spawned at full strength
    pub count: u32,
    /// Simulation time of the burst
    pub start_time: f32,
}

impl Default for InstantaneousEmitterConfig {
    fn default() -> Self {
        Self {
            count: 100,
            start_time: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct BurstState {
    emitted: bool,
}

/// Spawns all of its particles in the first step at or after its start time
#[derive(Debug, Clone, Default)]
pub struct InstantaneousEmitter {
    config: InstantaneousEmitterConfig,
}

impl InstantaneousEmitter {
    pub fn new(config: InstantaneousEmitterConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for InstantaneousEmitter {
    fn name(&self) -> &'static str {
        "Emit Instantaneously"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::empty()
    }

    fn create_context(&self) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(BurstState::default()))
    }
}

impl Emitter for InstantaneousEmitter {
    fn emit(
        &self,
        state: &mut ParticleState,
        strength: f32,
        ctx: &mut OperatorContext<'_>,
    ) -> AttributeMask {
        let Some(burst) = ctx.data_mut::<BurstState>() else {
            return AttributeMask::empty();
        };
        if burst.emitted || state.clock.cur_time < self.config.start_time {
            return AttributeMask::empty();
        }
        burst.emitted = true;

        let count = (self.config.count as f32 * strength).round() as usize;
        let spawned = state.spawn(count);
        if spawned.len() < count {
            log::debug!(
                "Burst of {count} clamped to {} by the particle limit",
                spawned.len()
            );
        }
        AttributeMask::empty()
    }

    fn may_create_more_particles(
        &self,
        _state: &ParticleState,
        data: Option<&(dyn Any + Send + Sync + 'static)>,
    ) -> bool {
        data.and_then(|data| data.downcast_ref::<BurstState>())
            .is_some_and(|burst| !burst.emitted)
    }

    fn skip_to_time(&self, state: &ParticleState, ctx: &mut OperatorContext<'_>) {
        if let Some(burst) = ctx.data_mut::<BurstState>()
            && state.clock.cur_time >= self.config.start_time
        {
            burst.emitted = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(
        emitter: &InstantaneousEmitter,
        state: &mut ParticleState,
        data: &mut Box<dyn Any + Send + Sync>,
        strength: f32,
    ) {
        let mut ctx = OperatorContext::new(Some(data.as_mut()), None, false);
        emitter.emit(state, strength, &mut ctx);
    }

    #[test]
    fn test_bursts_once() {
        let emitter = InstantaneousEmitter::new(InstantaneousEmitterConfig {
            count: 10,
            start_time: 0.5,
        });
        let mut data = emitter.create_context().unwrap();
        let mut state = ParticleState::for_tests(AttributeMask::empty(), 64);

        state.clock.cur_time = 0.25;
        emit(&emitter, &mut state, &mut data, 1.0);
        assert_eq!(state.active(), 0);
        assert!(emitter.may_create_more_particles(&state, Some(data.as_ref())));

        state.clock.cur_time = 0.5;
        emit(&emitter, &mut state, &mut data, 1.0);
        emit(&emitter, &mut state, &mut data, 1.0);
        assert_eq!(state.active(), 10);
        assert!(!emitter.may_create_more_particles(&state, Some(data.as_ref())));
    }

    #[test]
    fn test_count_scales_with_strength() {
        let emitter = InstantaneousEmitter::new(InstantaneousEmitterConfig {
            count: 10,
            start_time: 0.0,
        });
        let mut data = emitter.create_context().unwrap();
        let mut state = ParticleState::for_tests(AttributeMask::empty(), 64);
        emit(&emitter, &mut state, &mut data, 0.5);
        assert_eq!(state.active(), 5);
    }

    #[test]
    fn test_skip_past_start_suppresses_burst() {
        let emitter = InstantaneousEmitter::default();
        let mut data = emitter.create_context().unwrap();
        let mut state = ParticleState::for_tests(AttributeMask::empty(), 128);
        state.clock.cur_time = 2.0;
        let mut ctx = OperatorContext::new(Some(data.as_mut()), None, false);
        emitter.skip_to_time(&state, &mut ctx);
        drop(ctx);
        emit(&emitter, &mut state, &mut data, 1.0);
        assert_eq!(state.active(), 0);
    }
}
