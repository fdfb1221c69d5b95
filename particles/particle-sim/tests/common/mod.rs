//! Shared simulation fixtures

#![allow(dead_code)]

use glam::Vec3;
use particle_sim::{
    ParticleAttribute, ParticleCollection, ParticleSystemDefinition, SimulationContext,
    TraceResult, WorldQuery,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Enable log output for a test run
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Infinite floor at `z = height` that counts the traces it answers
#[derive(Debug, Default)]
pub struct CountingFloor {
    pub height: f32,
    traces: AtomicUsize,
}

impl CountingFloor {
    pub fn at(height: f32) -> Self {
        Self {
            height,
            traces: AtomicUsize::new(0),
        }
    }

    pub fn traces(&self) -> usize {
        self.traces.load(Ordering::Relaxed)
    }
}

impl WorldQuery for CountingFloor {
    fn trace_line(&self, start: Vec3, end: Vec3, _mask: u32, _group: i32) -> TraceResult {
        self.traces.fetch_add(1, Ordering::Relaxed);
        let (above, below) = (start.z - self.height, end.z - self.height);
        if above >= 0.0 && below < 0.0 {
            let fraction = above / (above - below);
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

/// Wall facing -X at `x = offset`
#[derive(Debug, Clone, Copy)]
pub struct Wall {
    pub offset: f32,
}

impl WorldQuery for Wall {
    fn trace_line(&self, start: Vec3, end: Vec3, _mask: u32, _group: i32) -> TraceResult {
        let (before, after) = (self.offset - start.x, self.offset - end.x);
        if before >= 0.0 && after < 0.0 {
            let fraction = before / (before - after);
            TraceResult {
                fraction,
                end_position: start.lerp(end, fraction),
                plane_normal: Vec3::NEG_X,
                start_solid: false,
            }
        } else {
            TraceResult::miss(end)
        }
    }
}

/// Collection of a definition with a fresh context
pub fn collection(definition: ParticleSystemDefinition) -> ParticleCollection {
    ParticleCollection::new(Arc::new(definition), Arc::new(SimulationContext::new()))
        .expect("Failed to create collection")
}

/// Collection of a definition tracing against `world`
pub fn collection_in(
    definition: ParticleSystemDefinition,
    world: Arc<dyn WorldQuery>,
) -> ParticleCollection {
    let context = SimulationContext::new().with_world(world);
    ParticleCollection::new(Arc::new(definition), Arc::new(context))
        .expect("Failed to create collection")
}

/// Current positions of every live particle
pub fn positions(collection: &ParticleCollection) -> Vec<Vec3> {
    let state = collection.state();
    (0..state.active())
        .map(|particle| state.store.vector(ParticleAttribute::Xyz, particle))
        .collect()
}

/// Per-step displacement of every live particle
pub fn displacements(collection: &ParticleCollection) -> Vec<Vec3> {
    let state = collection.state();
    (0..state.active())
        .map(|particle| {
            state.store.vector(ParticleAttribute::Xyz, particle)
                - state.store.vector(ParticleAttribute::PrevXyz, particle)
        })
        .collect()
}
