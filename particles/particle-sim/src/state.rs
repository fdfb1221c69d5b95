//! Per-collection simulation state shared with operators
//!
//! [`ParticleState`] is everything an operator may touch while it runs: the
//! attribute store, the control points, the clock, the random stream and the
//! kill list. The collection owns one and lends it to each stage in turn.

use glam::{Mat4, Vec3};
use particle_sheet::{Sheet, SheetSequenceSample};
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::collision::{CollisionCache, CollisionMode, CollisionSlots, EmptyWorld, WorldQuery};
use crate::control_points::ControlPointSet;
use crate::path::{BulgeControl, PathParams, PathValues};
use crate::random::{RandContextPool, RandomStream, RandomTable};
use crate::store::AttributeStore;
use parking_lot::Mutex;

/// Resources shared by every collection of one simulation
#[derive(Debug)]
pub struct SimulationContext {
    random_table: Arc<RandomTable>,
    rand_pool: RandContextPool,
    default_sample: SheetSequenceSample,
    world: Arc<dyn WorldQuery>,
    next_seed: AtomicU32,
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self {
            random_table: Arc::new(RandomTable::default()),
            rand_pool: RandContextPool::new(),
            default_sample: SheetSequenceSample::UNIT,
            world: Arc::new(EmptyWorld),
            next_seed: AtomicU32::new(0),
        }
    }
}

impl SimulationContext {
    /// Context with an empty world and the default random table
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the world used for collision traces
    pub fn with_world(mut self, world: Arc<dyn WorldQuery>) -> Self {
        self.world = world;
        self
    }

    /// Regenerate the random table from a seed
    pub fn with_random_table_seed(mut self, seed: u64) -> Self {
        self.random_table = Arc::new(RandomTable::new(seed));
        self
    }

    /// Sample handed out for particles without a sheet
    pub fn with_default_sample(mut self, sample: SheetSequenceSample) -> Self {
        self.default_sample = sample;
        self
    }

    /// Shared random table
    pub fn random_table(&self) -> &Arc<RandomTable> {
        &self.random_table
    }

    /// Pool of four-lane generators for block initializers
    pub fn rand_pool(&self) -> &RandContextPool {
        &self.rand_pool
    }

    /// Sample for particles without a sheet
    pub fn default_sample(&self) -> &SheetSequenceSample {
        &self.default_sample
    }

    /// World collision queries
    pub fn world(&self) -> &dyn WorldQuery {
        self.world.as_ref()
    }

    /// Seed for a collection without a fixed one
    pub(crate) fn next_random_seed(&self) -> u32 {
        self.next_seed
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_mul(0x9e37_79b9)
    }
}

/// Simulation time bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationClock {
    /// Time at the end of the current sub-step
    pub cur_time: f32,
    /// Length of the current sub-step
    pub dt: f32,
    /// Length of the sub-step before it
    pub prev_dt: f32,
    /// Time at the start of the current sub-step
    pub prev_sim_time: f32,
}

/// Mutable state of one collection as seen by its stages
#[derive(Debug)]
pub struct ParticleState {
    /// Attribute columns
    pub store: AttributeStore,
    /// Control points
    pub control_points: ControlPointSet,
    /// Clock
    pub clock: SimulationClock,
    /// Scalar random stream
    pub random: RandomStream,
    kill_list: Vec<usize>,
    context: Arc<SimulationContext>,
    sheet: Option<Arc<Sheet>>,
    collision: Arc<CollisionSlots>,
    operator_random_offset: u32,
    unique_particle_id: u32,
}

impl ParticleState {
    pub(crate) fn new(
        store: AttributeStore,
        random: RandomStream,
        context: Arc<SimulationContext>,
        sheet: Option<Arc<Sheet>>,
        collision: Arc<CollisionSlots>,
    ) -> Self {
        Self {
            store,
            control_points: ControlPointSet::new(),
            clock: SimulationClock::default(),
            random,
            kill_list: Vec::new(),
            context,
            sheet,
            collision,
            operator_random_offset: 0,
            unique_particle_id: 0,
        }
    }

    /// Live particle count
    #[inline]
    pub fn active(&self) -> usize {
        self.store.active()
    }

    /// Shared simulation resources
    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub(crate) fn context_arc(&self) -> &Arc<SimulationContext> {
        &self.context
    }

    /// World collision queries
    pub fn world(&self) -> &dyn WorldQuery {
        self.context.world()
    }

    /// Sheet bound to this collection
    pub fn sheet(&self) -> Option<&Arc<Sheet>> {
        self.sheet.as_ref()
    }

    /// Sheet sample for a particle age, the default sample without a sheet
    pub fn sheet_sample(&self, age: f32, age_scale: f32, sequence: usize) -> &SheetSequenceSample {
        match &self.sheet {
            Some(sheet) => sheet.sample(age, age_scale, sequence),
            None => self.context.default_sample(),
        }
    }

    /// Offset added to random sample ids by the running operator
    pub fn operator_random_offset(&self) -> u32 {
        self.operator_random_offset
    }

    pub(crate) fn set_operator_random_offset(&mut self, offset: u32) {
        self.operator_random_offset = offset;
    }

    /// Next stable particle id
    pub(crate) fn next_particle_id(&mut self) -> i32 {
        let id = self.random.seed().wrapping_add(self.unique_particle_id) & 4095;
        self.unique_particle_id = self.unique_particle_id.wrapping_add(1);
        id as i32
    }

    pub(crate) fn reset_unique_particle_id(&mut self) {
        self.unique_particle_id = 0;
    }

    /// Grow the live range by up to `count` particles and return the new
    /// slots. Creation time and ids are assigned during initialisation.
    pub fn spawn(&mut self, count: usize) -> Range<usize> {
        let first = self.store.active();
        let last = (first + count).min(self.store.max_particles());
        self.store.set_active(last);
        first..last
    }

    /// Queue a particle for removal after the running stage
    pub fn kill_particle(&mut self, index: usize) {
        if index < self.store.active() + 4 {
            self.kill_list.push(index);
        } else {
            log::warn!(
                "Ignoring kill of particle {index}, only {} active",
                self.store.active()
            );
        }
    }

    /// Particles queued for removal
    pub fn kill_list(&self) -> &[usize] {
        &self.kill_list
    }

    pub(crate) fn take_kill_list(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.kill_list)
    }

    pub(crate) fn set_kill_list(&mut self, list: Vec<usize>) {
        self.kill_list = list;
    }

    pub(crate) fn restore_kill_list(&mut self, mut list: Vec<usize>) {
        list.clear();
        self.kill_list = list;
    }

    /// Collision cache for a mode, shared with every collection in the chain
    pub fn collision_cache(&self, mode: CollisionMode) -> &Mutex<CollisionCache> {
        self.collision.get(mode)
    }

    /// Collision cache for a mode if anything has created it yet
    pub fn existing_collision_cache(&self, mode: CollisionMode) -> Option<&Mutex<CollisionCache>> {
        self.collision.existing(mode)
    }

    pub(crate) fn collision_slots(&self) -> &Arc<CollisionSlots> {
        &self.collision
    }

    /// Control point position at `time`, interpolated within the current step
    pub fn control_point_at_time(&self, id: usize, time: f32) -> Vec3 {
        self.control_points
            .position_at_time(id, time, self.clock.cur_time, self.clock.dt)
    }

    /// Control point transform at `time`
    pub fn control_point_transform_at_time(&self, id: usize, time: f32) -> Mat4 {
        self.control_points
            .transform_at_time(id, time, self.clock.cur_time, self.clock.dt)
    }

    /// Velocity of a control point over the last step
    pub fn control_point_velocity(&self, id: usize) -> Vec3 {
        self.control_points.velocity(id, self.clock.prev_dt)
    }

    /// Bezier points of a path sampled at `time`
    pub fn calculate_path_values(&self, params: &PathParams, time: f32) -> PathValues {
        let start = self.control_point_at_time(params.start_control_point, time);
        let end = self.control_point_at_time(params.end_control_point, time);
        let mut path = PathValues::straight(start, end, params.mid_point);

        match params.bulge_control {
            BulgeControl::Random => {
                path.mid += self.random.random_vector_at(
                    0,
                    Vec3::splat(-params.bulge),
                    Vec3::splat(params.bulge),
                );
            }
            BulgeControl::StartOrientation => {
                let forward = self.control_points.get(params.start_control_point).forward;
                path.bulge_along(forward, params.bulge);
            }
            BulgeControl::EndOrientation => {
                let forward = self.control_points.get(params.end_control_point).forward;
                path.bulge_along(forward, params.bulge);
            }
        }
        path
    }
}

#[cfg(test)]
impl ParticleState {
    /// Stand-alone state with seed 7 for unit tests
    pub(crate) fn for_tests(per_particle: crate::attributes::AttributeMask, max: usize) -> Self {
        Self::for_tests_with_context(per_particle, max, Arc::new(SimulationContext::new()))
    }

    /// Stand-alone state sharing a prepared context
    pub(crate) fn for_tests_with_context(
        per_particle: crate::attributes::AttributeMask,
        max: usize,
        context: Arc<SimulationContext>,
    ) -> Self {
        let random = RandomStream::new(context.random_table().clone(), 7);
        let store = AttributeStore::new(per_particle, crate::attributes::AttributeMask::empty(), max)
            .expect("test capacity");
        Self::new(store, random, context, None, Arc::new(CollisionSlots::new()))
    }
}
