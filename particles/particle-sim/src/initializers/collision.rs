//! Lifetime from time to impact

use glam::Vec3;
use std::sync::Arc;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::collision::{CollisionMode, TraceParams};
use crate::operator::{Initializer, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// Trace settings for [`LifespanFromVelocity`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct LifespanFromVelocityConfig {
    pub max_trace_length: f32,
    /// Distance ahead of the particle where the trace starts
    pub trace_offset: f32,
    /// Cached traces whose ends lie within this distance are reused
    pub trace_tolerance: f32,
    /// Per-axis weight of the distance to impact
    pub bias_distance: Vec3,
    pub contents_mask: u32,
    pub collision_group: i32,
}

impl Default for LifespanFromVelocityConfig {
    fn default() -> Self {
        Self {
            max_trace_length: 1024.0,
            trace_offset: 0.0,
            trace_tolerance: 64.0,
            bias_distance: Vec3::ONE,
            contents_mask: u32::MAX,
            collision_group: 0,
        }
    }
}

/// Sets the lifetime to the time a particle needs to reach the world along
/// its initial velocity
///
/// Particles already marked dead, or not moving, keep the lifetime an
/// earlier initializer gave them.
///
/// Traces go through the shared trace-down cache, so children spawned
/// together reuse each other's results.
#[derive(Debug, Clone, Default)]
pub struct LifespanFromVelocity {
    config: LifespanFromVelocityConfig,
}

impl LifespanFromVelocity {
    pub fn new(config: LifespanFromVelocityConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for LifespanFromVelocity {
    fn name(&self) -> &'static str {
        "Lifetime from Time to Impact"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::LIFE_DURATION
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
            | AttributeMask::PREV_XYZ
            | AttributeMask::CREATION_TIME
            | AttributeMask::LIFE_DURATION
    }
}

impl Initializer for LifespanFromVelocity {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        let total_length = config.max_trace_length - config.trace_offset;
        let tolerance_squared = config.trace_tolerance * config.trace_tolerance;
        let params = TraceParams {
            trace_length: total_length,
            contents_mask: config.contents_mask,
            collision_group: config.collision_group,
        };
        let prev_dt = state.clock.prev_dt;

        let slots = Arc::clone(state.collision_slots());
        let mut cache = slots.get(CollisionMode::InitialTraceDown).lock();
        let mut lifetimes = Vec::with_capacity(count);

        for particle in start..start + count {
            if state.store.float(ParticleAttribute::LifeDuration, particle) < 0.0 {
                continue;
            }
            let xyz = state.store.vector(ParticleAttribute::Xyz, particle);
            let prev = state.store.vector(ParticleAttribute::PrevXyz, particle);
            let velocity = if prev_dt > 0.0 {
                (xyz - prev) / prev_dt
            } else {
                Vec3::ZERO
            };
            let speed = velocity.length();
            if speed <= f32::EPSILON {
                continue;
            }
            let direction = velocity / speed;

            let trace_start = xyz + direction * config.trace_offset;
            let trace_end = trace_start + direction * total_length;
            let plane = cache.lookup_or_trace(
                state.world(),
                trace_start,
                trace_end,
                tolerance_squared,
                &params,
            );
            let impact = if plane.is_valid() { plane.point } else { plane.end };

            let distance = ((trace_start - impact) * config.bias_distance).length() + config.trace_offset;
            lifetimes.push((particle, distance / (speed + f32::EPSILON)));
        }
        drop(cache);

        for (particle, lifetime) in lifetimes {
            state
                .store
                .set_float(ParticleAttribute::LifeDuration, particle, lifetime);
        }
    }

    fn init_multiple_override(&self) -> bool {
        true
    }
}
