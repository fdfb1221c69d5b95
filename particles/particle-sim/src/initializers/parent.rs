//! Initializers that place children relative to their parent collection

use glam::{Quat, Vec3};
use std::any::Any;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::collision::{CachedPlane, CollisionMode};
use crate::operator::{Initializer, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

fn place_at_origin(state: &mut ParticleState, start: usize, count: usize) {
    for particle in start..start + count {
        state
            .store
            .set_vector(ParticleAttribute::Xyz, particle, Vec3::ZERO);
        state
            .store
            .set_vector(ParticleAttribute::PrevXyz, particle, Vec3::ZERO);
    }
}

fn remap_clamped(value: f32, a: f32, b: f32) -> f32 {
    if a == b {
        return if value >= b { 1.0 } else { 0.0 };
    }
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}

/// How children pick a parent particle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CreateFromParentParticlesConfig {
    /// 0 starts children at rest, 1 gives them the parent's velocity
    pub velocity_scale: f32,
    /// Pick a random parent instead of cycling
    pub random_distribution: bool,
    /// Parents skipped per child when cycling
    pub increment: usize,
}

impl Default for CreateFromParentParticlesConfig {
    fn default() -> Self {
        Self {
            velocity_scale: 0.0,
            random_distribution: false,
            increment: 1,
        }
    }
}

#[derive(Debug, Default)]
struct ParentCursor {
    current: usize,
}

/// Spawns children on the positions of live parent particles
#[derive(Debug, Clone, Default)]
pub struct CreateFromParentParticles {
    config: CreateFromParentParticlesConfig,
}

impl CreateFromParentParticles {
    pub fn new(config: CreateFromParentParticlesConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for CreateFromParentParticles {
    fn name(&self) -> &'static str {
        "Position From Parent Particles"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ | AttributeMask::LIFE_DURATION
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME
    }

    fn create_context(&self) -> Option<Box<dyn Any + Send + Sync>> {
        Some(Box::new(ParentCursor::default()))
    }
}

impl Initializer for CreateFromParentParticles {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        let Some(parent) = ctx.parent() else {
            place_at_origin(state, start, count);
            return;
        };
        let parents = parent.active();
        if parents == 0 {
            for particle in start..start + count {
                state
                    .store
                    .set_float(ParticleAttribute::LifeDuration, particle, 0.0);
            }
            return;
        }

        let last = parents - 1;
        let config = &self.config;
        let cur_time = state.clock.cur_time;
        let prev_time = cur_time - state.clock.dt;
        let mut current = ctx.data::<ParentCursor>().map_or(0, |cursor| cursor.current);

        for particle in start..start + count {
            if config.random_distribution {
                current = state.random.random_int(0, last as i32) as usize;
            } else if current > last {
                current = 0;
            }

            let ct = state.store.float(ParticleAttribute::CreationTime, particle);
            let subframe = remap_clamped(ct, prev_time, cur_time);
            let parent_xyz = parent.store.vector(ParticleAttribute::Xyz, current);
            let parent_prev = parent.store.vector(ParticleAttribute::PrevXyz, current);
            let position = parent_prev.lerp(parent_xyz, subframe);
            let previous = position.lerp(parent_prev, config.velocity_scale);

            state
                .store
                .set_vector(ParticleAttribute::Xyz, particle, position);
            state
                .store
                .set_vector(ParticleAttribute::PrevXyz, particle, previous);

            current += config.increment;
        }

        if let Some(cursor) = ctx.data_mut::<ParentCursor>() {
            cursor.current = current;
        }
    }
}

/// Local offset applied around cached hit points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CreateFromPlaneCacheConfig {
    /// Offset range in the frame of the hit normal (normal along x)
    pub offset_min: Vec3,
    pub offset_max: Vec3,
    /// Store the hit normal in `NORMAL`
    pub use_normal: bool,
}

/// Spawns children on the hit points the parent's trace-down cache holds
#[derive(Debug, Clone, Default)]
pub struct CreateFromPlaneCache {
    config: CreateFromPlaneCacheConfig,
}

impl CreateFromPlaneCache {
    pub fn new(config: CreateFromPlaneCacheConfig) -> Self {
        Self { config }
    }

    fn has_local_offset(&self) -> bool {
        self.config.offset_min != Vec3::ZERO && self.config.offset_max != Vec3::ZERO
    }
}

impl OperatorInfo for CreateFromPlaneCache {
    fn name(&self) -> &'static str {
        "Position from Parent Cache"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
            | AttributeMask::PREV_XYZ
            | AttributeMask::LIFE_DURATION
            | AttributeMask::NORMAL
    }
}

impl Initializer for CreateFromPlaneCache {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        let Some(parent) = ctx.parent() else {
            place_at_origin(state, start, count);
            return;
        };
        let planes: Vec<CachedPlane> = parent
            .existing_collision_cache(CollisionMode::InitialTraceDown)
            .map(|cache| cache.lock().planes().to_vec())
            .unwrap_or_default();
        if planes.is_empty() {
            place_at_origin(state, start, count);
            return;
        }

        let default_life = state.store.constant(ParticleAttribute::LifeDuration).x;
        let local_offset = self.has_local_offset();
        for particle in start..start + count {
            let index = state.random.random_int(0, planes.len() as i32 - 1) as usize;
            let plane = planes[index.min(planes.len() - 1)];
            if !plane.is_valid() {
                state
                    .store
                    .set_float(ParticleAttribute::LifeDuration, particle, 0.0);
                continue;
            }

            let mut point = plane.point;
            if local_offset {
                let offset = state
                    .random
                    .random_vector(self.config.offset_min, self.config.offset_max);
                let rotation = Quat::from_rotation_arc(Vec3::X, plane.normal.normalize_or_zero());
                point += rotation * Vec3::new(offset.z, offset.y, offset.x);
            }
            state.store.set_vector(ParticleAttribute::Xyz, particle, point);
            state
                .store
                .set_vector(ParticleAttribute::PrevXyz, particle, point);
            if self.config.use_normal {
                state
                    .store
                    .set_vector(ParticleAttribute::Normal, particle, plane.normal);
            }
            if mask.has(ParticleAttribute::LifeDuration) {
                state
                    .store
                    .set_float(ParticleAttribute::LifeDuration, particle, default_life);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{TraceParams, TraceResult, WorldQuery};

    #[derive(Debug)]
    struct Floor;

    impl WorldQuery for Floor {
        fn trace_line(&self, start: Vec3, end: Vec3, _mask: u32, _group: i32) -> TraceResult {
            if start.z > 0.0 && end.z <= 0.0 {
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

    fn parent_with(positions: &[(Vec3, Vec3)]) -> ParticleState {
        let mut parent = ParticleState::for_tests(AttributeMask::empty(), 16);
        parent.spawn(positions.len());
        for (particle, (xyz, prev)) in positions.iter().enumerate() {
            parent
                .store
                .set_vector(ParticleAttribute::Xyz, particle, *xyz);
            parent
                .store
                .set_vector(ParticleAttribute::PrevXyz, particle, *prev);
        }
        parent
    }

    fn child(count: usize) -> ParticleState {
        let mut child = ParticleState::for_tests(
            AttributeMask::LIFE_DURATION | AttributeMask::NORMAL,
            16,
        );
        child.clock.cur_time = 1.0;
        child.clock.dt = 0.1;
        child.spawn(count);
        for particle in 0..count {
            child
                .store
                .set_float(ParticleAttribute::CreationTime, particle, 1.0);
            child
                .store
                .set_float(ParticleAttribute::LifeDuration, particle, 5.0);
        }
        child
    }

    #[test]
    fn test_children_cycle_over_parents() {
        let parent = parent_with(&[
            (Vec3::X, Vec3::ZERO),
            (Vec3::Y, Vec3::ZERO),
            (Vec3::Z, Vec3::ZERO),
        ]);
        let mut state = child(5);
        let initializer = CreateFromParentParticles::default();
        let mut data = initializer.create_context();
        let mut ctx = OperatorContext::new(data.as_deref_mut(), Some(&parent), false);
        initializer.init_scalar(&mut state, 0, 5, AttributeMask::all(), &mut ctx);

        let expected = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::X, Vec3::Y];
        for (particle, position) in expected.into_iter().enumerate() {
            assert_eq!(state.store.vector(ParticleAttribute::Xyz, particle), position);
            // velocity scale 0 leaves children at rest
            assert_eq!(
                state.store.vector(ParticleAttribute::PrevXyz, particle),
                position
            );
        }
    }

    #[test]
    fn test_children_inherit_parent_velocity() {
        let parent = parent_with(&[(Vec3::new(2.0, 0.0, 0.0), Vec3::ZERO)]);
        let mut state = child(1);
        let initializer = CreateFromParentParticles::new(CreateFromParentParticlesConfig {
            velocity_scale: 1.0,
            ..Default::default()
        });
        let mut data = initializer.create_context();
        let mut ctx = OperatorContext::new(data.as_deref_mut(), Some(&parent), false);
        initializer.init_scalar(&mut state, 0, 1, AttributeMask::all(), &mut ctx);
        assert_eq!(
            state.store.vector(ParticleAttribute::PrevXyz, 0),
            Vec3::ZERO
        );
    }

    #[test]
    fn test_no_live_parents_kills_children() {
        let parent = parent_with(&[]);
        let mut state = child(2);
        let initializer = CreateFromParentParticles::default();
        let mut data = initializer.create_context();
        let mut ctx = OperatorContext::new(data.as_deref_mut(), Some(&parent), false);
        initializer.init_scalar(&mut state, 0, 2, AttributeMask::all(), &mut ctx);
        assert_eq!(state.store.float(ParticleAttribute::LifeDuration, 1), 0.0);
    }

    #[test]
    fn test_plane_cache_positions_on_hits() {
        let parent = parent_with(&[]);
        {
            let mut cache = parent
                .collision_cache(CollisionMode::InitialTraceDown)
                .lock();
            cache.lookup_or_trace(
                &Floor,
                Vec3::new(3.0, 0.0, 10.0),
                Vec3::new(3.0, 0.0, -10.0),
                0.0,
                &TraceParams::default(),
            );
        }
        let mut state = child(4);
        let initializer = CreateFromPlaneCache::new(CreateFromPlaneCacheConfig {
            use_normal: true,
            ..Default::default()
        });
        let mut ctx = OperatorContext::new(None, Some(&parent), false);
        initializer.init_scalar(&mut state, 0, 4, AttributeMask::empty(), &mut ctx);
        for particle in 0..4 {
            assert_eq!(
                state.store.vector(ParticleAttribute::Xyz, particle),
                Vec3::new(3.0, 0.0, 0.0)
            );
            assert_eq!(state.store.vector(ParticleAttribute::Normal, particle), Vec3::Z);
            assert_eq!(state.store.float(ParticleAttribute::LifeDuration, particle), 5.0);
        }
    }

    #[test]
    fn test_plane_cache_misses_kill() {
        let parent = parent_with(&[]);
        parent
            .collision_cache(CollisionMode::InitialTraceDown)
            .lock()
            .lookup_or_trace(
                &Floor,
                Vec3::new(0.0, 0.0, -1.0),
                Vec3::new(0.0, 0.0, -5.0),
                0.0,
                &TraceParams::default(),
            );
        let mut state = child(2);
        let mut ctx = OperatorContext::new(None, Some(&parent), false);
        CreateFromPlaneCache::default().init_scalar(&mut state, 0, 2, AttributeMask::all(), &mut ctx);
        assert_eq!(state.store.float(ParticleAttribute::LifeDuration, 0), 0.0);
    }

    #[test]
    fn test_without_parent_spawns_at_origin() {
        let mut state = child(1);
        state
            .store
            .set_vector(ParticleAttribute::Xyz, 0, Vec3::ONE);
        CreateFromPlaneCache::default().init_scalar(
            &mut state,
            0,
            1,
            AttributeMask::all(),
            &mut OperatorContext::detached(),
        );
        assert_eq!(state.store.vector(ParticleAttribute::Xyz, 0), Vec3::ZERO);
    }
}
