//! Particle collections
//!
//! A [`ParticleCollection`] is one live instance of a particle system
//! definition. It owns the attribute store and control points, runs the
//! stage pipeline every step and drives its child collections.

use glam::{Mat4, Vec3};
use log::{debug, trace};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::collision::CollisionSlots;
use crate::config::OperatorTiming;
use crate::control_points::{ControlPointSource, MAX_CONTROL_POINTS};
use crate::definition::{ParticleSystemDefinition, Stage};
use crate::error::Result;
use crate::operator::{OperatorContext, OperatorInfo, RenderSink, init_new_particles};
use crate::random::RandomStream;
use crate::state::{ParticleState, SimulationContext};
use crate::store::AttributeStore;

/// Steps shorter than this do not advance the simulation
const MIN_SIMULATION_DT: f32 = 1.0e-22;

/// Previous-step length assumed for control points on the first frame
const FIRST_FRAME_DT: f32 = 0.05;

/// Most sub-steps simulated by one call
const MAX_SUB_STEPS: f32 = 10.0;

/// Random sample ids reserved per operator within a step
const OPERATOR_RANDOM_OFFSET_STRIDE: u32 = 17;

/// Iterative constraint passes per step
const MAX_CONSTRAINT_PASSES: usize = 3;

/// How [`ParticleCollection::restart`] treats emitters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartMode {
    /// Reset emitter and initializer state
    #[default]
    Reset,
    /// Reset, and make sure the emitters fire again even if no step with a
    /// positive time delta happens before the next restart
    ResetAndMakeSureEmitsHappen,
}

type ContextSlot = Option<Box<dyn Any + Send + Sync>>;

#[derive(Default)]
struct StageContexts {
    emitters: Vec<ContextSlot>,
    initializers: Vec<ContextSlot>,
    operators: Vec<ContextSlot>,
    constraints: Vec<ContextSlot>,
    renderers: Vec<ContextSlot>,
}

impl fmt::Debug for StageContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = |slots: &[ContextSlot]| slots.iter().filter(|slot| slot.is_some()).count();
        f.debug_struct("StageContexts")
            .field("emitters", &live(&self.emitters))
            .field("initializers", &live(&self.initializers))
            .field("operators", &live(&self.operators))
            .field("constraints", &live(&self.constraints))
            .field("renderers", &live(&self.renderers))
            .finish()
    }
}

fn create_contexts<T: ?Sized + OperatorInfo>(stages: &[Stage<T>]) -> Vec<ContextSlot> {
    stages.iter().map(|stage| stage.op.create_context()).collect()
}

impl StageContexts {
    fn new(definition: &ParticleSystemDefinition) -> Self {
        Self {
            emitters: create_contexts(definition.emitters()),
            initializers: create_contexts(definition.initializers()),
            operators: create_contexts(definition.operators()),
            constraints: create_contexts(definition.constraints()),
            renderers: create_contexts(definition.renderers()),
        }
    }
}

fn stage_strength(state: &ParticleState, timing: &OperatorTiming) -> Option<f32> {
    let strength = timing.strength(state.clock.cur_time, &state.random);
    (strength > 0.0).then_some(strength)
}

/// Remove the particles in a sorted, in-range kill list
fn compact(store: &mut AttributeStore, kill_list: &[usize], order_important: bool) {
    let active = store.active();
    if kill_list.len() >= active {
        store.set_active(0);
        return;
    }

    if order_important {
        let mut kills = kill_list.iter().peekable();
        let mut write = kill_list[0];
        for read in kill_list[0]..active {
            if kills.next_if_eq(&&read).is_some() {
                continue;
            }
            store.move_particle(read, write);
            write += 1;
        }
        store.set_active(write);
        return;
    }

    // Fill each hole with the last live particle
    let (mut low, mut high) = (0, kill_list.len());
    let mut end = active;
    while low < high {
        let kill = kill_list[low];
        low += 1;
        while low < high && kill_list[high - 1] == end - 1 {
            high -= 1;
            end -= 1;
        }
        if kill == end - 1 {
            end -= 1;
            break;
        }
        store.move_particle(end - 1, kill);
        end -= 1;
    }
    store.set_active(end);
}

/// One running particle system
#[derive(Debug)]
pub struct ParticleCollection {
    definition: Arc<ParticleSystemDefinition>,
    state: ParticleState,
    contexts: StageContexts,
    emitter_stopped: Vec<bool>,
    children: Vec<ParticleCollection>,
    first_frame: bool,
    frozen: bool,
    prev_control_points_initialized: bool,
    pending_restart: bool,
    emission_stopped: bool,
    drawn_frames: u32,
}

impl ParticleCollection {
    /// Instantiate a definition and its children
    pub fn new(
        definition: Arc<ParticleSystemDefinition>,
        context: Arc<SimulationContext>,
    ) -> Result<Self> {
        let slots = Arc::new(CollisionSlots::new());
        Self::create(definition, context, slots, 0.0)
    }

    fn create(
        definition: Arc<ParticleSystemDefinition>,
        context: Arc<SimulationContext>,
        collision: Arc<CollisionSlots>,
        start_time: f32,
    ) -> Result<Self> {
        let config = definition.config();
        let masks = definition.masks();

        let mut store = AttributeStore::new(
            masks.per_particle(),
            masks.initial_copies(),
            config.max_particles,
        )?;
        store.set_constant_float(ParticleAttribute::LifeDuration, config.constant_lifetime);
        store.set_constant_float(ParticleAttribute::Radius, config.constant_radius);
        store.set_constant_float(ParticleAttribute::Rotation, config.constant_rotation);
        store.set_constant_float(
            ParticleAttribute::RotationSpeed,
            config.constant_rotation_speed,
        );
        store.set_constant_vector(ParticleAttribute::TintRgb, config.constant_tint());
        store.set_constant_float(ParticleAttribute::Alpha, config.constant_alpha());
        store.set_constant_float(ParticleAttribute::Alpha2, 1.0);
        store.set_constant_float(
            ParticleAttribute::SequenceNumber,
            config.constant_sequence_number as f32,
        );
        store.set_constant_float(
            ParticleAttribute::SequenceNumber1,
            config.constant_sequence_number1 as f32,
        );
        store.set_constant_vector(ParticleAttribute::Normal, config.constant_normal);
        store.set_constant_vector(ParticleAttribute::GlowRgb, config.constant_tint());
        store.set_constant_float(ParticleAttribute::GlowAlpha, config.constant_alpha());

        let seed = config
            .random_seed
            .unwrap_or_else(|| context.next_random_seed());
        let random = RandomStream::new(Arc::clone(context.random_table()), seed);
        let mut state = ParticleState::new(
            store,
            random,
            Arc::clone(&context),
            definition.sheet().cloned(),
            Arc::clone(&collision),
        );
        state.clock.cur_time = start_time;

        let children = definition
            .children()
            .iter()
            .map(|child| {
                Self::create(
                    Arc::clone(&child.definition),
                    Arc::clone(&context),
                    Arc::clone(&collision),
                    start_time - child.delay,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Created collection '{}' with capacity {} and {} children",
            definition.name(),
            config.max_particles,
            children.len()
        );

        Ok(Self {
            contexts: StageContexts::new(&definition),
            emitter_stopped: vec![false; definition.emitters().len()],
            definition,
            state,
            children,
            first_frame: true,
            frozen: false,
            prev_control_points_initialized: false,
            pending_restart: false,
            emission_stopped: false,
            drawn_frames: 0,
        })
    }

    pub fn definition(&self) -> &Arc<ParticleSystemDefinition> {
        &self.definition
    }

    /// Simulation state
    pub fn state(&self) -> &ParticleState {
        &self.state
    }

    /// Mutable simulation state, for driving a collection by hand
    pub fn state_mut(&mut self) -> &mut ParticleState {
        &mut self.state
    }

    pub fn children(&self) -> &[ParticleCollection] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [ParticleCollection] {
        &mut self.children
    }

    /// Live particle count
    pub fn active_particles(&self) -> usize {
        self.state.active()
    }

    /// Current simulation time
    pub fn cur_time(&self) -> f32 {
        self.state.clock.cur_time
    }

    /// Whether the collection stopped simulating for good
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Whether emission has been stopped
    pub fn is_emission_stopped(&self) -> bool {
        self.emission_stopped
    }

    /// Force the live particle count, clamped to capacity
    pub fn set_n_active_particles(&mut self, count: usize) {
        self.state.store.set_active(count);
    }

    /// Advance the simulation by `dt` seconds
    pub fn simulate(&mut self, dt: f32) {
        self.simulate_with_parent(dt, None);
    }

    fn simulate_with_parent(&mut self, dt: f32, parent: Option<&ParticleState>) {
        if dt < 0.0 || self.frozen {
            return;
        }

        // Delayed children wait for their time to reach zero
        if self.state.clock.cur_time < 0.0 {
            if dt >= MIN_SIMULATION_DT {
                self.state.clock.cur_time += dt;
                self.update_prev_control_points(dt);
            }
            return;
        }

        if self.first_frame {
            self.simulate_first_frame(parent);
            self.first_frame = false;
        } else if !self.prev_control_points_initialized {
            let prev_dt = self.state.clock.prev_dt;
            self.update_prev_control_points(prev_dt);
        }

        if dt < MIN_SIMULATION_DT {
            return;
        }
        self.pending_restart = false;

        let config = self.definition.config().clone();
        let max_dt = config.effective_max_time_step();
        let mut remaining = dt;
        if config.maximum_sim_time != 0.0 && self.drawn_frames <= config.minimum_frames {
            if remaining + self.state.clock.cur_time > config.maximum_sim_time {
                remaining = (config.maximum_sim_time - self.state.clock.cur_time)
                    .max(config.minimum_sim_time);
            }
            self.drawn_frames += 1;
        }
        remaining = remaining.min(MAX_SUB_STEPS * max_dt);

        let mut sub_steps = 0;
        while remaining > 0.0 {
            let mut step = remaining.min(max_dt);
            if step < config.min_time_step {
                step = config.min_time_step;
            }
            remaining -= step;

            let clock = &mut self.state.clock;
            if clock.dt != 0.0 {
                clock.prev_dt = clock.dt;
            }
            clock.dt = step;
            clock.prev_sim_time = clock.cur_time;
            clock.cur_time += step;

            self.run_operators(true, parent);
            self.emit_and_init(parent, false);
            if self.state.active() > 0 {
                self.run_operators(false, parent);
            }
            self.run_constraints(parent);
            self.post_simulate(parent);
            sub_steps += 1;
        }
        trace!(
            "Simulated '{}' for {dt}s in {sub_steps} sub-steps, {} particles",
            self.definition.name(),
            self.state.active()
        );

        let Self {
            children, state, ..
        } = self;
        for child in children.iter_mut() {
            child.simulate_with_parent(dt, Some(&*state));
        }

        self.update_prev_control_points(dt);
        if config.stop_simulation_after_time < self.state.clock.cur_time {
            debug!("Freezing '{}' at {}", self.definition.name(), self.state.clock.cur_time);
            self.frozen = true;
        }
    }

    fn simulate_first_frame(&mut self, parent: Option<&ParticleState>) {
        let clock = &mut self.state.clock;
        clock.prev_sim_time = 1.0e23;
        clock.dt = 0.0;
        self.drawn_frames = 0;

        if !self.prev_control_points_initialized {
            self.update_prev_control_points(FIRST_FRAME_DT);
        }

        let definition = Arc::clone(&self.definition);
        let mut offset = 0;
        for (index, stage) in definition.operators().iter().enumerate() {
            self.state.set_operator_random_offset(offset);
            if stage.op.run_before_emitters()
                && let Some(strength) = stage_strength(&self.state, &stage.timing)
            {
                let mut ctx =
                    OperatorContext::new(self.contexts.operators[index].as_deref_mut(), parent, false);
                stage.op.operate(&mut self.state, strength, &mut ctx);
                self.update_prev_control_points(FIRST_FRAME_DT);
            }
            offset += OPERATOR_RANDOM_OFFSET_STRIDE;
        }
        self.state.set_operator_random_offset(0);

        let initial = definition.config().initial_particles;
        if initial > 0 {
            let spawned = self.state.spawn(initial);
            self.initialize_new_particles(
                spawned.start,
                spawned.len(),
                AttributeMask::empty(),
                parent,
                false,
            );
        }
    }

    fn update_prev_control_points(&mut self, dt: f32) {
        self.state.clock.prev_dt = dt;
        self.state.control_points.update_previous();
        self.prev_control_points_initialized = true;
    }

    fn run_operators(&mut self, before_emitters: bool, parent: Option<&ParticleState>) {
        let definition = Arc::clone(&self.definition);
        let mut offset = 0;
        for (index, stage) in definition.operators().iter().enumerate() {
            if stage.op.run_before_emitters() != before_emitters {
                continue;
            }
            let Some(strength) = stage_strength(&self.state, &stage.timing) else {
                continue;
            };

            self.state.set_operator_random_offset(offset);
            let mut ctx =
                OperatorContext::new(self.contexts.operators[index].as_deref_mut(), parent, false);
            stage.op.operate(&mut self.state, strength, &mut ctx);

            if !self.state.kill_list().is_empty() {
                self.apply_kill_list();
                if !before_emitters && self.state.active() == 0 {
                    break;
                }
            }
            offset += OPERATOR_RANDOM_OFFSET_STRIDE;
        }
        self.state.set_operator_random_offset(0);
    }

    fn run_constraints(&mut self, parent: Option<&ParticleState>) {
        let definition = Arc::clone(&self.definition);
        let constraints = definition.constraints();
        if constraints.is_empty() || self.state.active() == 0 {
            return;
        }

        for (index, stage) in constraints.iter().enumerate() {
            let mut ctx =
                OperatorContext::new(self.contexts.constraints[index].as_deref_mut(), parent, false);
            stage.op.setup_per_frame(&self.state, &mut ctx);
        }

        for _ in 0..MAX_CONSTRAINT_PASSES {
            let mut changed = false;
            for (index, stage) in constraints.iter().enumerate() {
                if stage.op.is_final() {
                    continue;
                }
                let mut ctx = OperatorContext::new(
                    self.contexts.constraints[index].as_deref_mut(),
                    parent,
                    false,
                );
                changed |= stage.op.constrain(&mut self.state, &mut ctx);
            }
            if !changed {
                break;
            }
        }

        for (index, stage) in constraints.iter().enumerate() {
            if stage.op.is_final() {
                let mut ctx = OperatorContext::new(
                    self.contexts.constraints[index].as_deref_mut(),
                    parent,
                    false,
                );
                stage.op.constrain(&mut self.state, &mut ctx);
            }
        }

        if !self.state.kill_list().is_empty() {
            self.apply_kill_list();
        }
    }

    fn post_simulate(&mut self, parent: Option<&ParticleState>) {
        let definition = Arc::clone(&self.definition);
        for (index, stage) in definition.renderers().iter().enumerate() {
            let mut ctx =
                OperatorContext::new(self.contexts.renderers[index].as_deref_mut(), parent, false);
            stage.op.post_simulate(&mut self.state, &mut ctx);
        }
    }

    /// Whether any emitter wants to run while the parent applies its kill list
    fn runs_for_parent_kill_list(&self) -> bool {
        self.definition
            .emitters()
            .iter()
            .any(|stage| stage.op.should_run(true))
    }

    fn emit_and_init(&mut self, parent: Option<&ParticleState>, applying_parent_kill_list: bool) {
        if applying_parent_kill_list && !self.runs_for_parent_kill_list() {
            return;
        }

        let definition = Arc::clone(&self.definition);
        for (index, stage) in definition.emitters().iter().enumerate() {
            if self.emitter_stopped[index] || !stage.op.should_run(applying_parent_kill_list) {
                continue;
            }
            let Some(strength) = stage_strength(&self.state, &stage.timing) else {
                continue;
            };

            let before = self.state.active();
            let mut ctx = OperatorContext::new(
                self.contexts.emitters[index].as_deref_mut(),
                parent,
                applying_parent_kill_list,
            );
            let initialized = stage.op.emit(&mut self.state, strength, &mut ctx);
            let after = self.state.active();
            if after > before {
                self.initialize_new_particles(
                    before,
                    after - before,
                    initialized,
                    parent,
                    applying_parent_kill_list,
                );
            }
        }
    }

    /// Run the initializers over freshly spawned particles `first..first + count`.
    ///
    /// Creation time and particle id are assigned first unless the emitter
    /// set them. Regular initializers then run in order and only while they
    /// still have an attribute left to fill; override initializers always
    /// run afterwards. Whatever is still unset comes from the constants.
    pub fn initialize_new_particles(
        &mut self,
        first: usize,
        count: usize,
        initialized: AttributeMask,
        parent: Option<&ParticleState>,
        applying_parent_kill_list: bool,
    ) {
        let definition = Arc::clone(&self.definition);
        let mut left = self.state.store.per_particle_mask() - initialized;

        let inputs = left & AttributeMask::INPUTS;
        self.fill_inputs(first, count, inputs);
        left -= inputs;

        for pass_overrides in [false, true] {
            for (index, stage) in definition.initializers().iter().enumerate() {
                let op = stage.op.as_ref();
                if op.init_multiple_override() != pass_overrides {
                    continue;
                }
                let written = op.written_attributes();
                if !pass_overrides && !written.intersects(left) {
                    continue;
                }
                if !op.should_run(applying_parent_kill_list) {
                    continue;
                }
                let Some(strength) = stage_strength(&self.state, &stage.timing) else {
                    continue;
                };

                let mut ctx = OperatorContext::new(
                    self.contexts.initializers[index].as_deref_mut(),
                    parent,
                    applying_parent_kill_list,
                )
                .with_strength(strength);
                init_new_particles(op, &mut self.state, first, count, left, &mut ctx);
                left -= written;
            }
        }

        for particle in first..first + count {
            self.state.store.fill_from_constants(left, particle);
        }
        self.state.store.copy_initial_values(first, count);
    }

    fn fill_inputs(&mut self, first: usize, count: usize, inputs: AttributeMask) {
        let cur_time = self.state.clock.cur_time;
        for particle in first..first + count {
            if inputs.has(ParticleAttribute::ParticleId) {
                let id = self.state.next_particle_id();
                self.state
                    .store
                    .set_int(ParticleAttribute::ParticleId, particle, id);
            }
            if inputs.has(ParticleAttribute::CreationTime) {
                self.state
                    .store
                    .set_float(ParticleAttribute::CreationTime, particle, cur_time);
            }
        }
    }

    /// Remove every particle queued with [`ParticleState::kill_particle`]
    pub fn apply_kill_list(&mut self) {
        let active = self.state.active();
        let mut kill_list = self.state.take_kill_list();
        kill_list.sort_unstable();
        kill_list.dedup();
        kill_list.retain(|&index| index < active);
        if kill_list.is_empty() {
            self.state.restore_kill_list(kill_list);
            return;
        }

        // Children spawning from dead parents see the final list
        self.state.set_kill_list(kill_list);
        let Self {
            children, state, ..
        } = self;
        for child in children.iter_mut() {
            child.emit_and_init(Some(&*state), true);
        }

        let kill_list = self.state.take_kill_list();
        trace!(
            "Killing {} of {} particles in '{}'",
            kill_list.len(),
            active,
            self.definition.name()
        );
        compact(
            &mut self.state.store,
            &kill_list,
            self.definition.config().order_important,
        );
        self.state.restore_kill_list(kill_list);
    }

    /// Restart emission, optionally guaranteeing that emitters fire again
    pub fn restart(&mut self, mode: RestartMode) {
        self.restart_with_parent(mode, None);
    }

    fn restart_with_parent(&mut self, mode: RestartMode, parent: Option<&ParticleState>) {
        self.drawn_frames = 0;
        if self.pending_restart {
            self.run_restarted_emitters(parent);
            self.pending_restart = false;
        }
        if mode == RestartMode::ResetAndMakeSureEmitsHappen {
            self.pending_restart = true;
            self.prev_control_points_initialized = false;
        }

        self.contexts.emitters = create_contexts(self.definition.emitters());
        self.contexts.initializers = create_contexts(self.definition.initializers());
        self.state.reset_unique_particle_id();

        let Self {
            children, state, ..
        } = self;
        for child in children.iter_mut() {
            child.restart_with_parent(mode, Some(&*state));
        }
    }

    fn run_restarted_emitters(&mut self, parent: Option<&ParticleState>) {
        if self.first_frame {
            self.simulate_first_frame(parent);
            self.first_frame = false;
        } else {
            let prev_dt = self.state.clock.prev_dt;
            self.update_prev_control_points(prev_dt);
        }

        self.emit_and_init(parent, false);

        let Self {
            children, state, ..
        } = self;
        for child in children.iter_mut() {
            child.run_restarted_emitters(Some(&*state));
        }
    }

    /// Jump forward to time `t` without simulating the gap
    pub fn skip_to_time(&mut self, t: f32) {
        if t <= self.state.clock.cur_time {
            return;
        }
        let gap = t - self.state.clock.cur_time;
        self.update_prev_control_points(gap);
        self.state.clock.cur_time = t;
        self.first_frame = false;

        let definition = Arc::clone(&self.definition);
        for (index, stage) in definition.emitters().iter().enumerate() {
            let mut ctx =
                OperatorContext::new(self.contexts.emitters[index].as_deref_mut(), None, false);
            stage.op.skip_to_time(&self.state, &mut ctx);
        }

        for (child, child_def) in self.children.iter_mut().zip(definition.children()) {
            child.skip_to_time(t - child_def.delay);
        }
    }

    /// Stop emitters, optionally only the ones that never finish, and
    /// optionally drop every live particle
    pub fn stop_emission(&mut self, infinite_only: bool, remove_all_particles: bool) {
        self.emission_stopped = true;
        for (stopped, stage) in self.emitter_stopped.iter_mut().zip(self.definition.emitters()) {
            if !infinite_only || stage.op.is_infinite() {
                *stopped = true;
            }
        }
        if remove_all_particles {
            self.state.store.set_active(0);
        }
        for child in &mut self.children {
            child.stop_emission(infinite_only, remove_all_particles);
        }
    }

    /// Resume emitters stopped by [`ParticleCollection::stop_emission`]
    pub fn start_emission(&mut self, infinite_only: bool) {
        self.emission_stopped = false;
        for (stopped, stage) in self.emitter_stopped.iter_mut().zip(self.definition.emitters()) {
            if !infinite_only || stage.op.is_infinite() {
                *stopped = false;
            }
        }
        for child in &mut self.children {
            child.start_emission(infinite_only);
        }
    }

    /// Whether nothing is alive and nothing will spawn again, here or in
    /// any child
    pub fn is_finished(&self) -> bool {
        if self.first_frame || self.state.active() > 0 {
            return false;
        }
        let may_emit = self
            .definition
            .emitters()
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.emitter_stopped[*index])
            .any(|(index, stage)| {
                stage
                    .op
                    .may_create_more_particles(&self.state, self.contexts.emitters[index].as_deref())
            });
        !may_emit && self.children.iter().all(ParticleCollection::is_finished)
    }

    /// Bounding box of every live particle here and in the children
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.children
            .iter()
            .filter_map(ParticleCollection::bounds)
            .chain(self.state.store.bounds())
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
    }

    /// Move a control point here and in every child
    pub fn set_control_point_position(&mut self, id: usize, position: Vec3) -> Result<()> {
        self.state.control_points.set_position(id, position)?;
        self.children
            .iter_mut()
            .try_for_each(|child| child.set_control_point_position(id, position))
    }

    /// Orient a control point here and in every child
    pub fn set_control_point_orientation(
        &mut self,
        id: usize,
        forward: Vec3,
        right: Vec3,
        up: Vec3,
    ) -> Result<()> {
        self.state
            .control_points
            .set_orientation(id, forward, right, up)?;
        self.children
            .iter_mut()
            .try_for_each(|child| child.set_control_point_orientation(id, forward, right, up))
    }

    /// Set a control point from a forward/left/up/origin transform here and
    /// in every child
    pub fn set_control_point_transform(&mut self, id: usize, transform: &Mat4) -> Result<()> {
        self.state.control_points.set_transform(id, transform)?;
        self.children
            .iter_mut()
            .try_for_each(|child| child.set_control_point_transform(id, transform))
    }

    /// Link a control point to a parent here and in every child
    pub fn set_control_point_parent(&mut self, id: usize, parent: Option<usize>) -> Result<()> {
        self.state.control_points.set_parent(id, parent)?;
        self.children
            .iter_mut()
            .try_for_each(|child| child.set_control_point_parent(id, parent))
    }

    /// Pull every control point the pipeline reads from a source
    pub fn update_control_points(&mut self, source: &dyn ControlPointSource) {
        let mask = self.definition.masks().control_points;
        let mask = if mask == 0 { 1 } else { mask };
        self.state.control_points.update_from(source, mask);
        for child in &mut self.children {
            child.update_control_points(source);
        }
    }

    /// Whether the pipeline samples a control point
    pub fn reads_control_point(&self, id: usize) -> bool {
        id < MAX_CONTROL_POINTS && self.definition.masks().control_points & (1 << id) != 0
    }

    /// Hand every renderer's output to `sink`, children after the parent
    pub fn render(&self, sink: &mut dyn RenderSink) {
        for stage in self.definition.renderers() {
            stage.op.render(&self.state, sink);
        }
        for child in &self.children {
            child.render(sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_collection_can_be_shared_across_threads() {
        assert_send_sync::<ParticleCollection>();
    }

    fn store_with(active: usize) -> AttributeStore {
        let mut store =
            AttributeStore::new(AttributeMask::RADIUS, AttributeMask::empty(), 16).unwrap();
        store.set_active(active);
        for particle in 0..active {
            store.set_float(ParticleAttribute::Radius, particle, particle as f32);
        }
        store
    }

    fn radii(store: &AttributeStore) -> Vec<f32> {
        (0..store.active())
            .map(|particle| store.float(ParticleAttribute::Radius, particle))
            .collect()
    }

    #[test]
    fn test_compact_fills_holes_from_end() {
        let mut store = store_with(6);
        compact(&mut store, &[1, 5], false);
        assert_eq!(radii(&store), vec![0.0, 4.0, 2.0, 3.0]);

        let mut store = store_with(6);
        compact(&mut store, &[0, 4, 5], false);
        assert_eq!(radii(&store), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_compact_keeps_order() {
        let mut store = store_with(6);
        compact(&mut store, &[1, 3], true);
        assert_eq!(radii(&store), vec![0.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_compact_everything() {
        let mut store = store_with(3);
        compact(&mut store, &[0, 1, 2], true);
        assert_eq!(store.active(), 0);
    }
}
