//! World collision through the shared collision caches

use glam::Vec3;
use std::sync::Arc;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::collision::{CachedPlane, CollisionMode, TraceParams};
use crate::control_points::{ControlPointMask, check_control_point, control_point_mask};
use crate::operator::{Constraint, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// Collision settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct WorldCollisionConfig {
    /// Only the per-particle, per-frame planeset and nearest-trace modes
    /// collide
    pub mode: CollisionMode,
    /// Control point the planeset modes trace around
    pub control_point: usize,
    /// Distance a per-particle query may be from a cached trace to reuse it
    pub trace_tolerance: f32,
    /// Distance the control point may move before the planeset is rebuilt
    pub rebuild_tolerance: f32,
    /// Length of the planeset traces
    pub trace_length: f32,
    /// Share of the normal velocity kept after impact
    pub bounce: f32,
    /// Share of the tangential velocity lost on impact
    pub slide: f32,
    pub kill_on_collision: bool,
    pub contents_mask: u32,
    pub collision_group: i32,
}

impl Default for WorldCollisionConfig {
    fn default() -> Self {
        Self {
            mode: CollisionMode::PerParticleTrace,
            control_point: 0,
            trace_tolerance: 4.0,
            rebuild_tolerance: 16.0,
            trace_length: 1024.0,
            bounce: 0.0,
            slide: 0.0,
            kill_on_collision: false,
            contents_mask: u32::MAX,
            collision_group: 0,
        }
    }
}

/// Keeps particles out of world geometry, bouncing or killing them on
/// impact
#[derive(Debug, Clone, Default)]
pub struct WorldCollision {
    config: WorldCollisionConfig,
}

enum Impact {
    Moved { xyz: Vec3, prev: Vec3 },
    Killed,
}

impl WorldCollision {
    pub fn new(config: WorldCollisionConfig) -> Self {
        Self { config }
    }

    fn params(&self) -> TraceParams {
        TraceParams {
            trace_length: self.config.trace_length,
            contents_mask: self.config.contents_mask,
            collision_group: self.config.collision_group,
        }
    }

    fn resolve(&self, xyz: Vec3, prev: Vec3, plane: &CachedPlane) -> Option<Impact> {
        if !plane.is_valid() {
            return None;
        }
        let depth = (xyz - plane.point).dot(plane.normal);
        if depth >= 0.0 {
            return None;
        }
        if self.config.kill_on_collision {
            return Some(Impact::Killed);
        }

        let xyz = xyz - plane.normal * depth;
        let velocity = xyz - prev;
        let normal_part = plane.normal * velocity.dot(plane.normal);
        let tangent_part = velocity - normal_part;
        let velocity = tangent_part * (1.0 - self.config.slide) - normal_part * self.config.bounce;
        Some(Impact::Moved {
            xyz,
            prev: xyz - velocity,
        })
    }

    fn planeset_origin(&self, state: &ParticleState) -> Vec3 {
        state.control_points.get(self.config.control_point).position
    }
}

impl OperatorInfo for WorldCollision {
    fn name(&self) -> &'static str {
        "Collision via traces"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn read_control_points(&self) -> ControlPointMask {
        match self.config.mode {
            CollisionMode::PerParticleTrace => 0,
            _ => control_point_mask(self.config.control_point),
        }
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.config.mode == CollisionMode::InitialTraceDown {
            return Err(crate::error::ParticleError::InvalidConfig(
                "the trace-down cache only feeds initializers".to_string(),
            ));
        }
        check_control_point(self.config.control_point)?;
        Ok(())
    }
}

impl Constraint for WorldCollision {
    fn setup_per_frame(&self, state: &ParticleState, _ctx: &mut OperatorContext<'_>) {
        if self.config.mode == CollisionMode::PerParticleTrace {
            return;
        }
        let origin = self.planeset_origin(state);
        state.collision_cache(self.config.mode).lock().ensure_built(
            state.world(),
            self.config.mode,
            origin,
            self.config.rebuild_tolerance,
            state.clock.cur_time,
            &self.params(),
        );
    }

    fn constrain(&self, state: &mut ParticleState, _ctx: &mut OperatorContext<'_>) -> bool {
        let mode = self.config.mode;
        let slots = Arc::clone(state.collision_slots());
        let mut impacts = Vec::new();
        {
            let mut cache = slots.get(mode).lock();
            let origin = self.planeset_origin(state);
            let tolerance_squared = self.config.trace_tolerance * self.config.trace_tolerance;
            let params = self.params();

            for particle in 0..state.active() {
                let xyz = state.store.vector(ParticleAttribute::Xyz, particle);
                let prev = state.store.vector(ParticleAttribute::PrevXyz, particle);
                let impact = match mode {
                    CollisionMode::PerParticleTrace => {
                        if xyz == prev {
                            continue;
                        }
                        let plane =
                            cache.lookup_or_trace(state.world(), prev, xyz, tolerance_squared, &params);
                        self.resolve(xyz, prev, &plane)
                    }
                    CollisionMode::UseNearestTrace => cache
                        .best_in_direction(origin, xyz - origin)
                        .and_then(|plane| self.resolve(xyz, prev, plane)),
                    CollisionMode::PerFramePlaneset | CollisionMode::InitialTraceDown => {
                        let mut current = (xyz, prev);
                        let mut hit = None;
                        for plane in cache.planes() {
                            match self.resolve(current.0, current.1, plane) {
                                Some(Impact::Moved { xyz, prev }) => {
                                    current = (xyz, prev);
                                    hit = Some(Impact::Moved { xyz, prev });
                                }
                                Some(Impact::Killed) => {
                                    hit = Some(Impact::Killed);
                                    break;
                                }
                                None => {}
                            }
                        }
                        hit
                    }
                };
                if let Some(impact) = impact {
                    impacts.push((particle, impact));
                }
            }
        }

        let mut moved = false;
        for (particle, impact) in impacts {
            match impact {
                Impact::Moved { xyz, prev } => {
                    state.store.set_vector(ParticleAttribute::Xyz, particle, xyz);
                    state
                        .store
                        .set_vector(ParticleAttribute::PrevXyz, particle, prev);
                    moved = true;
                }
                Impact::Killed => state.kill_particle(particle),
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{TraceResult, WorldQuery};
    use crate::state::SimulationContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Floor at z = 0
    #[derive(Debug, Default)]
    struct Floor {
        traces: AtomicUsize,
    }

    impl WorldQuery for Floor {
        fn trace_line(&self, start: Vec3, end: Vec3, _mask: u32, _group: i32) -> TraceResult {
            self.traces.fetch_add(1, Ordering::Relaxed);
            if start.z >= 0.0 && end.z < 0.0 {
                let fraction = start.z / (start.z - end.z);
                TraceResult {
                    fraction,
                    end_position: start.lerp(end, fraction),
                    plane_normal: Vec3::Z,
                    start_solid: false,
                }
            } else {
                TraceResult::miss(end)
            }
        }
    }

    fn falling(world: Arc<Floor>, count: usize) -> ParticleState {
        let context = Arc::new(SimulationContext::new().with_world(world));
        let mut state = ParticleState::for_tests_with_context(AttributeMask::empty(), 16, context);
        state.spawn(count);
        for particle in 0..count {
            let x = particle as f32 * 0.1;
            state
                .store
                .set_vector(ParticleAttribute::Xyz, particle, Vec3::new(x, 0.0, -1.0));
            state
                .store
                .set_vector(ParticleAttribute::PrevXyz, particle, Vec3::new(x, 0.0, 1.0));
        }
        state
    }

    fn run(collision: &WorldCollision, state: &mut ParticleState) -> bool {
        let mut ctx = OperatorContext::detached();
        collision.setup_per_frame(state, &mut ctx);
        collision.constrain(state, &mut ctx)
    }

    #[test]
    fn test_per_particle_bounce_reuses_traces() {
        let world = Arc::new(Floor::default());
        let mut state = falling(Arc::clone(&world), 6);
        let collision = WorldCollision::new(WorldCollisionConfig {
            bounce: 1.0,
            ..Default::default()
        });
        assert!(run(&collision, &mut state));
        assert_eq!(world.traces.load(Ordering::Relaxed), 1);
        for particle in 0..6 {
            let xyz = state.store.vector(ParticleAttribute::Xyz, particle);
            let prev = state.store.vector(ParticleAttribute::PrevXyz, particle);
            assert!(xyz.z.abs() < 1e-5);
            // moving up after the bounce
            assert!(xyz.z - prev.z > 0.0);
        }
    }

    #[test]
    fn test_planeset_kills_on_contact() {
        let world = Arc::new(Floor::default());
        let mut state = falling(Arc::clone(&world), 3);
        state
            .control_points
            .set_position_and_previous(0, Vec3::new(0.0, 0.0, 10.0))
            .unwrap();
        let collision = WorldCollision::new(WorldCollisionConfig {
            mode: CollisionMode::PerFramePlaneset,
            kill_on_collision: true,
            ..Default::default()
        });
        run(&collision, &mut state);
        let traces = world.traces.load(Ordering::Relaxed);
        assert!(traces > 0);
        assert_eq!(state.kill_list(), &[0, 1, 2]);

        // the origin has not moved, so the planeset is reused
        run(&collision, &mut state);
        assert_eq!(world.traces.load(Ordering::Relaxed), traces);
    }

    #[test]
    fn test_nearest_trace_pushes_out() {
        let world = Arc::new(Floor::default());
        let mut state = falling(Arc::clone(&world), 1);
        state
            .control_points
            .set_position_and_previous(0, Vec3::new(0.0, 0.0, 10.0))
            .unwrap();
        let collision = WorldCollision::new(WorldCollisionConfig {
            mode: CollisionMode::UseNearestTrace,
            ..Default::default()
        });
        assert!(run(&collision, &mut state));
        assert!(state.store.vector(ParticleAttribute::Xyz, 0).z.abs() < 1e-5);
    }

    #[test]
    fn test_trace_down_mode_rejected() {
        let collision = WorldCollision::new(WorldCollisionConfig {
            mode: CollisionMode::InitialTraceDown,
            ..Default::default()
        });
        assert!(collision.validate().is_err());
    }
}
