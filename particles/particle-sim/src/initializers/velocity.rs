//! Velocity initializers
//!
//! Velocity is implicit: it lives in the gap between `PREV_XYZ` and `XYZ`.
//! These run after the position initializers and only move `PREV_XYZ`.

use glam::Vec3;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::control_points::{ControlPointMask, check_control_point, control_point_mask};
use crate::error::Result;
use crate::operator::{Initializer, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

fn nudge_previous(state: &mut ParticleState, particle: usize, offset: Vec3) {
    let previous = state.store.vector(ParticleAttribute::PrevXyz, particle);
    state
        .store
        .set_vector(ParticleAttribute::PrevXyz, particle, previous - offset);
}

/// Control point whose motion is inherited
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct InheritVelocityConfig {
    pub control_point: usize,
    pub velocity_scale: f32,
}

impl Default for InheritVelocityConfig {
    fn default() -> Self {
        Self {
            control_point: 0,
            velocity_scale: 1.0,
        }
    }
}

/// Adds the control point's movement over the last step to new particles
#[derive(Debug, Clone, Default)]
pub struct InheritVelocity {
    config: InheritVelocityConfig,
}

impl InheritVelocity {
    pub fn new(config: InheritVelocityConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for InheritVelocity {
    fn name(&self) -> &'static str {
        "Velocity Inherit from Control Point"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::PREV_XYZ
    }

    fn read_control_points(&self) -> ControlPointMask {
        control_point_mask(self.config.control_point)
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.control_point)?;
        Ok(())
    }
}

impl Initializer for InheritVelocity {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let point = state.control_points.get(self.config.control_point);
        let delta = (point.position - point.prev_position) * self.config.velocity_scale;
        for particle in start..start + count {
            nudge_previous(state, particle, delta);
        }
    }

    fn init_multiple_override(&self) -> bool {
        true
    }
}

/// Random velocity ranges
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct VelocityRandomConfig {
    pub control_point: usize,
    /// Per-axis world speed range
    pub speed_min: f32,
    pub speed_max: f32,
    /// Speed range in the control point's frame (forward, left, up)
    pub local_speed_min: Vec3,
    pub local_speed_max: Vec3,
}

/// Adds a random velocity, in world space and in the control point's frame
#[derive(Debug, Clone, Default)]
pub struct VelocityRandom {
    config: VelocityRandomConfig,
}

impl VelocityRandom {
    pub fn new(config: VelocityRandomConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for VelocityRandom {
    fn name(&self) -> &'static str {
        "Velocity Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::PREV_XYZ | AttributeMask::CREATION_TIME
    }

    fn read_control_points(&self) -> ControlPointMask {
        control_point_mask(self.config.control_point)
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.control_point)?;
        Ok(())
    }
}

impl Initializer for VelocityRandom {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        let has_local_speed =
            config.local_speed_min != Vec3::ZERO || config.local_speed_max != Vec3::ZERO;

        for particle in start..start + count {
            let mut velocity = Vec3::ZERO;
            if has_local_speed {
                let speed = state
                    .random
                    .random_vector(config.local_speed_min, config.local_speed_max);
                let ct = state.store.float(ParticleAttribute::CreationTime, particle);
                velocity += state
                    .control_point_transform_at_time(config.control_point, ct)
                    .transform_vector3(speed);
            }
            if config.speed_max > 0.0 {
                velocity += state
                    .random
                    .random_vector_uniform(config.speed_min, config.speed_max);
            }
            nudge_previous(state, particle, velocity * state.clock.prev_dt);
        }
    }

    fn init_multiple_override(&self) -> bool {
        true
    }
}
