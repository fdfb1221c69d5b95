//! Operator stages
//!
//! A particle system is a pipeline of stages. Each stage kind has its own
//! trait; all of them share [`OperatorInfo`], which declares the attributes
//! and control points the stage touches so the collection can size its
//! storage and the definition builder can check ordering.
//!
//! Stages are immutable and shared between collections. Anything an
//! instance needs to remember between calls lives in a context created per
//! collection by [`OperatorInfo::create_context`] and handed back through
//! [`OperatorContext`].

use glam::Vec3;
use particle_sheet::SheetSequenceSample;
use std::any::Any;
use std::fmt;

use crate::attributes::AttributeMask;
use crate::batch::LANES;
use crate::control_points::ControlPointMask;
use crate::error::Result;
use crate::state::ParticleState;

/// Below this many particles initializers always take the scalar path
pub const MIN_PARTICLES_FOR_BLOCK_INIT: usize = 16;

/// Declarations shared by every stage kind
pub trait OperatorInfo: Send + Sync + fmt::Debug {
    /// Name used in logs and validation errors
    fn name(&self) -> &'static str;

    /// Attributes this stage writes
    fn written_attributes(&self) -> AttributeMask;

    /// Attributes this stage reads
    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::empty()
    }

    /// Attributes whose spawn-time value this stage reads
    fn read_initial_attributes(&self) -> AttributeMask {
        AttributeMask::empty()
    }

    /// Control points this stage samples
    fn read_control_points(&self) -> ControlPointMask {
        0
    }

    /// Control points used as parameter carriers rather than positions
    fn non_positional_control_points(&self) -> ControlPointMask {
        0
    }

    /// Per-collection context, recreated on restart
    fn create_context(&self) -> Option<Box<dyn Any + Send + Sync>> {
        None
    }

    /// Check the configuration
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Extra inputs handed to a stage for one call
pub struct OperatorContext<'a> {
    data: Option<&'a mut (dyn Any + Send + Sync + 'static)>,
    parent: Option<&'a ParticleState>,
    applying_parent_kill_list: bool,
    strength: f32,
}

impl fmt::Debug for OperatorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorContext")
            .field("has_data", &self.data.is_some())
            .field("has_parent", &self.parent.is_some())
            .field("applying_parent_kill_list", &self.applying_parent_kill_list)
            .field("strength", &self.strength)
            .finish()
    }
}

impl<'a> OperatorContext<'a> {
    /// Context for one stage call
    pub fn new(
        data: Option<&'a mut (dyn Any + Send + Sync + 'static)>,
        parent: Option<&'a ParticleState>,
        applying_parent_kill_list: bool,
    ) -> Self {
        Self {
            data,
            parent,
            applying_parent_kill_list,
            strength: 1.0,
        }
    }

    /// Set the stage strength reported to initializers
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    /// Context without data or parent
    pub fn detached() -> Self {
        Self::new(None, None, false)
    }

    /// Stage data, if present and of type `T`
    pub fn data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.as_deref_mut()?.downcast_mut::<T>()
    }

    /// Stage data, if present and of type `T`
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref()?.downcast_ref::<T>()
    }

    /// State of the parent collection
    pub fn parent(&self) -> Option<&'a ParticleState> {
        self.parent
    }

    /// Whether the parent is applying its kill list
    pub fn applying_parent_kill_list(&self) -> bool {
        self.applying_parent_kill_list
    }

    /// Strength of the running stage, 1 outside any fade
    pub fn strength(&self) -> f32 {
        self.strength
    }
}

/// Spawns particles
pub trait Emitter: OperatorInfo {
    /// Spawn particles for the current step and return the attributes the
    /// emitter set on them itself
    fn emit(&self, state: &mut ParticleState, strength: f32, ctx: &mut OperatorContext<'_>)
    -> AttributeMask;

    /// Whether the emitter may spawn again after the current step
    fn may_create_more_particles(
        &self,
        _state: &ParticleState,
        _data: Option<&(dyn Any + Send + Sync + 'static)>,
    ) -> bool {
        false
    }

    /// Whether the emitter runs in a given phase. Emitters normally run in
    /// the regular step and skip the parent's kill list.
    fn should_run(&self, applying_parent_kill_list: bool) -> bool {
        !applying_parent_kill_list
    }

    /// Whether the emitter never finishes on its own
    fn is_infinite(&self) -> bool {
        false
    }

    /// Fast-forward internal counters after the collection skipped in time
    fn skip_to_time(&self, _state: &ParticleState, _ctx: &mut OperatorContext<'_>) {}
}

/// Fills attributes of newly spawned particles
pub trait Initializer: OperatorInfo {
    /// Initialise particles `start..start + count` one at a time
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        attribute_write_mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    );

    /// Initialise whole blocks `start_block..start_block + block_count`.
    ///
    /// Must agree with [`Initializer::init_scalar`] for every particle.
    fn init_block(
        &self,
        state: &mut ParticleState,
        start_block: usize,
        block_count: usize,
        attribute_write_mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        self.init_scalar(
            state,
            start_block * LANES,
            block_count * LANES,
            attribute_write_mask,
            ctx,
        );
    }

    /// Run after every regular initializer and overwrite their output
    fn init_multiple_override(&self) -> bool {
        false
    }

    /// Whether to run for particles spawned from the parent's kill list
    fn run_for_parent_kill_list(&self) -> bool {
        true
    }

    /// Whether the initializer runs in a given phase
    fn should_run(&self, applying_parent_kill_list: bool) -> bool {
        !applying_parent_kill_list || self.run_for_parent_kill_list()
    }
}

/// Per-step attribute update
pub trait Operator: OperatorInfo {
    /// Update every live particle
    fn operate(&self, state: &mut ParticleState, strength: f32, ctx: &mut OperatorContext<'_>);

    /// Run before the emitters of each step
    fn run_before_emitters(&self) -> bool {
        false
    }
}

/// Position correction run after the operators of each step
pub trait Constraint: OperatorInfo {
    /// Gather whatever the constraint needs once per step
    fn setup_per_frame(&self, _state: &ParticleState, _ctx: &mut OperatorContext<'_>) {}

    /// Apply the constraint and report whether any particle moved
    fn constrain(&self, state: &mut ParticleState, ctx: &mut OperatorContext<'_>) -> bool;

    /// Run once after the iterative passes instead of inside them
    fn is_final(&self) -> bool {
        false
    }
}

/// One textured quad produced by a renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteQuad {
    pub position: Vec3,
    pub radius: f32,
    pub rotation: f32,
    pub color: Vec3,
    pub alpha: f32,
    pub sample: SheetSequenceSample,
}

/// Consumer of renderer output
pub trait RenderSink {
    /// Accept one quad
    fn push_sprite(&mut self, quad: SpriteQuad);
}

impl RenderSink for Vec<SpriteQuad> {
    fn push_sprite(&mut self, quad: SpriteQuad) {
        self.push(quad);
    }
}

/// Turns simulated particles into draw data
pub trait Renderer: OperatorInfo {
    /// Hook run at the end of every sub-step
    fn post_simulate(&self, _state: &mut ParticleState, _ctx: &mut OperatorContext<'_>) {}

    /// Emit draw data for every live particle
    fn render(&self, state: &ParticleState, sink: &mut dyn RenderSink);
}

/// Initialise `count` particles from `start`, using the block path for the
/// aligned middle of large ranges and the scalar path for the rest
pub fn init_new_particles(
    initializer: &dyn Initializer,
    state: &mut ParticleState,
    start: usize,
    count: usize,
    attribute_write_mask: AttributeMask,
    ctx: &mut OperatorContext<'_>,
) {
    if count == 0 {
        return;
    }
    if count < MIN_PARTICLES_FOR_BLOCK_INIT {
        initializer.init_scalar(state, start, count, attribute_write_mask, ctx);
        return;
    }

    let (mut start, mut count) = (start, count);
    let misaligned = start % LANES;
    if misaligned != 0 {
        let head = (LANES - misaligned).min(count);
        initializer.init_scalar(state, start, head, attribute_write_mask, ctx);
        start += head;
        count -= head;
    }

    let blocks = count / LANES;
    if blocks > 0 {
        initializer.init_block(state, start / LANES, blocks, attribute_write_mask, ctx);
        start += blocks * LANES;
        count -= blocks * LANES;
    }

    if count > 0 {
        initializer.init_scalar(state, start, count, attribute_write_mask, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<(&'static str, usize, usize)>>,
    }

    impl OperatorInfo for Recorder {
        fn name(&self) -> &'static str {
            "Recorder"
        }

        fn written_attributes(&self) -> AttributeMask {
            AttributeMask::RADIUS
        }
    }

    impl Initializer for Recorder {
        fn init_scalar(
            &self,
            _state: &mut ParticleState,
            start: usize,
            count: usize,
            _mask: AttributeMask,
            _ctx: &mut OperatorContext<'_>,
        ) {
            self.calls.lock().push(("scalar", start, count));
        }

        fn init_block(
            &self,
            _state: &mut ParticleState,
            start_block: usize,
            block_count: usize,
            _mask: AttributeMask,
            _ctx: &mut OperatorContext<'_>,
        ) {
            self.calls.lock().push(("block", start_block, block_count));
        }
    }

    fn dispatch(start: usize, count: usize) -> Vec<(&'static str, usize, usize)> {
        let recorder = Recorder::default();
        let mut state = ParticleState::for_tests(AttributeMask::RADIUS, 64);
        init_new_particles(
            &recorder,
            &mut state,
            start,
            count,
            AttributeMask::RADIUS,
            &mut OperatorContext::detached(),
        );
        recorder.calls.into_inner()
    }

    #[test]
    fn test_small_ranges_stay_scalar() {
        assert_eq!(dispatch(3, 15), vec![("scalar", 3, 15)]);
        assert!(dispatch(0, 0).is_empty());
    }

    #[test]
    fn test_head_blocks_tail() {
        assert_eq!(
            dispatch(3, 20),
            vec![("scalar", 3, 1), ("block", 1, 4), ("scalar", 20, 3)]
        );
        assert_eq!(dispatch(8, 16), vec![("block", 2, 4)]);
    }

    #[test]
    fn test_context_downcast() {
        let mut value: Box<dyn Any + Send + Sync> = Box::new(41u32);
        let mut ctx = OperatorContext::new(Some(&mut *value), None, false);
        if let Some(counter) = ctx.data_mut::<u32>() {
            *counter += 1;
        }
        assert_eq!(ctx.data::<u32>(), Some(&42));
        assert!(ctx.data::<f32>().is_none());
    }
}
