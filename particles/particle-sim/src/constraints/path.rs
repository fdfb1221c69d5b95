//! Constraint to a moving point along a path

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::control_points::ControlPointMask;
use crate::error::Result;
use crate::operator::{Constraint, OperatorContext, OperatorInfo};
use crate::path::PathParams;
use crate::state::ParticleState;

use super::clamp_to_shell;

/// Path and the allowed distance from it
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct ConstrainToPathConfig {
    pub path: PathParams,
    pub min_distance: f32,
    /// Allowed distance at the start of the path
    pub max_distance0: f32,
    /// Allowed distance at the middle, negative to interpolate start to end
    pub max_distance_mid: f32,
    /// Allowed distance at the end, negative to reuse the start distance
    pub max_distance1: f32,
    /// Seconds a particle takes to travel the whole path
    pub travel_time: f32,
}

impl Default for ConstrainToPathConfig {
    fn default() -> Self {
        Self {
            path: PathParams::default(),
            min_distance: 0.0,
            max_distance0: 100.0,
            max_distance_mid: -1.0,
            max_distance1: -1.0,
            travel_time: 1.0,
        }
    }
}

/// Drags particles along a bezier path as they age
#[derive(Debug, Clone, Default)]
pub struct ConstrainToPath {
    config: ConstrainToPathConfig,
}

impl ConstrainToPath {
    pub fn new(config: ConstrainToPathConfig) -> Self {
        Self { config }
    }

    fn max_distance(&self, t: f32) -> f32 {
        let config = &self.config;
        let end = if config.max_distance1 >= 0.0 {
            config.max_distance1
        } else {
            config.max_distance0
        };
        if config.max_distance_mid < 0.0 {
            return config.max_distance0 + (end - config.max_distance0) * t;
        }
        if t < 0.5 {
            config.max_distance0 + (config.max_distance_mid - config.max_distance0) * t * 2.0
        } else {
            config.max_distance_mid + (end - config.max_distance_mid) * (t * 2.0 - 1.0)
        }
    }
}

impl OperatorInfo for ConstrainToPath {
    fn name(&self) -> &'static str {
        "Constrain particles to a path"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::CREATION_TIME
    }

    fn read_control_points(&self) -> ControlPointMask {
        self.config.path.control_point_mask()
    }

    fn validate(&self) -> Result<()> {
        self.config.path.validate()
    }
}

impl Constraint for ConstrainToPath {
    fn constrain(&self, state: &mut ParticleState, _ctx: &mut OperatorContext<'_>) -> bool {
        let now = state.clock.cur_time;
        let path = state.calculate_path_values(&self.config.path, now);
        let travel_time = self.config.travel_time.max(f32::EPSILON);
        let mut changed = false;

        for particle in 0..state.active() {
            let age = now - state.store.float(ParticleAttribute::CreationTime, particle);
            let t = (age / travel_time).clamp(0.0, 1.0);
            let center = path.evaluate(t);
            let xyz = state.store.vector(ParticleAttribute::Xyz, particle);
            if let Some(clamped) =
                clamp_to_shell(xyz, center, self.config.min_distance, self.max_distance(t))
            {
                state.store.set_vector(ParticleAttribute::Xyz, particle, clamped);
                changed = true;
            }
        }
        changed
    }
}
