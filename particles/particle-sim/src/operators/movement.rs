//! Integration and expiry

use glam::Vec3;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::batch::{F32x4, FourVectors};
use crate::operator::{Operator, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// Seconds over which drag removes its share of velocity
const DRAG_DECAY_TIME: f32 = 1.0 / 30.0;

/// Constant forces
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct BasicMovementConfig {
    /// Acceleration in units per second squared
    pub gravity: Vec3,
    /// Share of velocity lost every thirtieth of a second, 0-1
    pub drag: f32,
}

/// Verlet integration of position with gravity and drag
///
/// Velocity is never stored: the next position is `xyz + (xyz - prev) * k +
/// a * dt²` where `k` rescales the last displacement to the current step and
/// applies drag.
#[derive(Debug, Clone, Default)]
pub struct BasicMovement {
    config: BasicMovementConfig,
}

impl BasicMovement {
    pub fn new(config: BasicMovementConfig) -> Self {
        Self { config }
    }

    fn displacement_scale(&self, dt: f32, prev_dt: f32) -> f32 {
        let ratio = if prev_dt > 0.0 { dt / prev_dt } else { 1.0 };
        let keep = 1.0 - self.config.drag.clamp(0.0, 1.0);
        let decay = if keep > 0.0 {
            (keep.ln() / DRAG_DECAY_TIME * dt).exp()
        } else {
            0.0
        };
        ratio * decay
    }
}

impl OperatorInfo for BasicMovement {
    fn name(&self) -> &'static str {
        "Movement Basic"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }
}

impl Operator for BasicMovement {
    fn operate(&self, state: &mut ParticleState, strength: f32, _ctx: &mut OperatorContext<'_>) {
        let dt = state.clock.dt;
        let scale = F32x4::splat(self.displacement_scale(dt, state.clock.prev_dt));
        let acceleration = FourVectors::splat(self.config.gravity * (strength * dt * dt));

        for block in 0..state.store.active_blocks() {
            let xyz = state.store.vector4(ParticleAttribute::Xyz, block);
            let prev = state.store.vector4(ParticleAttribute::PrevXyz, block);
            let next = xyz + (xyz - prev) * scale + acceleration;
            state.store.set_vector4(ParticleAttribute::PrevXyz, block, &xyz);
            state.store.set_vector4(ParticleAttribute::Xyz, block, &next);
        }
    }
}

/// Kills particles older than their lifetime
#[derive(Debug, Clone, Copy, Default)]
pub struct LifespanDecay;

impl OperatorInfo for LifespanDecay {
    fn name(&self) -> &'static str {
        "Lifespan Decay"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::empty()
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME | AttributeMask::LIFE_DURATION
    }
}

impl Operator for LifespanDecay {
    fn operate(&self, state: &mut ParticleState, _strength: f32, _ctx: &mut OperatorContext<'_>) {
        let now = state.clock.cur_time;
        for particle in 0..state.active() {
            let born = state.store.float(ParticleAttribute::CreationTime, particle);
            let lifetime = state.store.float(ParticleAttribute::LifeDuration, particle);
            if now - born >= lifetime {
                state.kill_particle(particle);
            }
        }
    }
}
