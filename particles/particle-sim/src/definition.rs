//! Particle system definitions
//!
//! A [`ParticleSystemDefinition`] is the immutable recipe shared by every
//! collection of one effect: configuration, the ordered stages and child
//! effects. Building one aggregates the stage declarations into
//! [`DefinitionMasks`] and rejects pipelines that read an attribute before
//! anything writes it.
//!
//! ```rust,ignore
//! use particle_sim::prelude::*;
//!
//! let definition = ParticleSystemDefinition::builder("sparks")
//!     .emitter(InstantaneousEmitter::new(InstantaneousEmitterConfig { count: 32, ..Default::default() }))
//!     .initializer(CreateWithinSphere::default())
//!     .initializer(RandomLifetime::default())
//!     .operator(BasicMovement::default())
//!     .operator(LifespanDecay)
//!     .build()?;
//! ```

use log::debug;
use particle_sheet::Sheet;
use std::sync::Arc;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::config::{OperatorTiming, SimulationConfig};
use crate::control_points::ControlPointMask;
use crate::error::{ParticleError, Result};
use crate::operator::{Constraint, Emitter, Initializer, Operator, OperatorInfo, Renderer};

/// A stage together with its strength envelope
#[derive(Debug)]
pub struct Stage<T: ?Sized> {
    pub op: Box<T>,
    pub timing: OperatorTiming,
}

impl<T: ?Sized> Stage<T> {
    fn new(op: Box<T>, timing: OperatorTiming) -> Self {
        Self { op, timing }
    }
}

/// A child effect and its start delay in seconds
#[derive(Debug, Clone)]
pub struct ChildDefinition {
    pub definition: Arc<ParticleSystemDefinition>,
    pub delay: f32,
}

/// Attribute and control point usage of a whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefinitionMasks {
    /// Written by emitters and initializers
    pub initialized: AttributeMask,
    /// Written by operators, constraints and renderers
    pub updated: AttributeMask,
    /// Read by any stage
    pub read: AttributeMask,
    /// Spawn-time values read by any stage
    pub read_initial: AttributeMask,
    /// Control points sampled by any stage
    pub control_points: ControlPointMask,
    /// Control points used as parameter carriers
    pub non_positional_control_points: ControlPointMask,
}

impl DefinitionMasks {
    /// Attributes that need a column per particle
    pub fn per_particle(&self) -> AttributeMask {
        self.initialized | self.updated
    }

    /// Attributes that also keep a spawn-time copy
    pub fn initial_copies(&self) -> AttributeMask {
        self.read_initial & self.initialized & self.updated
    }

    fn add(&mut self, op: &dyn OperatorInfo) {
        self.read |= op.read_attributes();
        self.read_initial |= op.read_initial_attributes();
        self.control_points |= op.read_control_points();
        self.non_positional_control_points |= op.non_positional_control_points();
    }
}

/// Immutable description of one particle effect
#[derive(Debug)]
pub struct ParticleSystemDefinition {
    name: String,
    config: SimulationConfig,
    emitters: Vec<Stage<dyn Emitter>>,
    initializers: Vec<Stage<dyn Initializer>>,
    operators: Vec<Stage<dyn Operator>>,
    constraints: Vec<Stage<dyn Constraint>>,
    renderers: Vec<Stage<dyn Renderer>>,
    children: Vec<ChildDefinition>,
    sheet: Option<Arc<Sheet>>,
    masks: DefinitionMasks,
}

impl ParticleSystemDefinition {
    /// Start building a definition
    pub fn builder(name: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn emitters(&self) -> &[Stage<dyn Emitter>] {
        &self.emitters
    }

    pub fn initializers(&self) -> &[Stage<dyn Initializer>] {
        &self.initializers
    }

    pub fn operators(&self) -> &[Stage<dyn Operator>] {
        &self.operators
    }

    pub fn constraints(&self) -> &[Stage<dyn Constraint>] {
        &self.constraints
    }

    pub fn renderers(&self) -> &[Stage<dyn Renderer>] {
        &self.renderers
    }

    pub fn children(&self) -> &[ChildDefinition] {
        &self.children
    }

    /// Sheet bound to collections of this definition
    pub fn sheet(&self) -> Option<&Arc<Sheet>> {
        self.sheet.as_ref()
    }

    /// Aggregate attribute and control point usage
    pub fn masks(&self) -> &DefinitionMasks {
        &self.masks
    }

    /// Whether any emitter ever stops on its own
    pub fn has_infinite_emitter(&self) -> bool {
        self.emitters.iter().any(|stage| stage.op.is_infinite())
    }
}

/// Builder for [`ParticleSystemDefinition`]
#[derive(Debug)]
pub struct DefinitionBuilder {
    name: String,
    config: SimulationConfig,
    emitters: Vec<Stage<dyn Emitter>>,
    initializers: Vec<Stage<dyn Initializer>>,
    operators: Vec<Stage<dyn Operator>>,
    constraints: Vec<Stage<dyn Constraint>>,
    renderers: Vec<Stage<dyn Renderer>>,
    children: Vec<ChildDefinition>,
    sheet: Option<Arc<Sheet>>,
}

impl DefinitionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: SimulationConfig::default(),
            emitters: Vec::new(),
            initializers: Vec::new(),
            operators: Vec::new(),
            constraints: Vec::new(),
            renderers: Vec::new(),
            children: Vec::new(),
            sheet: None,
        }
    }

    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn emitter(self, emitter: impl Emitter + 'static) -> Self {
        self.emitter_with_timing(emitter, OperatorTiming::default())
    }

    pub fn emitter_with_timing(mut self, emitter: impl Emitter + 'static, timing: OperatorTiming) -> Self {
        self.emitters.push(Stage::new(Box::new(emitter) as Box<dyn Emitter>, timing));
        self
    }

    pub fn initializer(self, initializer: impl Initializer + 'static) -> Self {
        self.initializer_with_timing(initializer, OperatorTiming::default())
    }

    pub fn initializer_with_timing(
        mut self,
        initializer: impl Initializer + 'static,
        timing: OperatorTiming,
    ) -> Self {
        self.initializers.push(Stage::new(Box::new(initializer) as Box<dyn Initializer>, timing));
        self
    }

    pub fn operator(self, operator: impl Operator + 'static) -> Self {
        self.operator_with_timing(operator, OperatorTiming::default())
    }

    pub fn operator_with_timing(mut self, operator: impl Operator + 'static, timing: OperatorTiming) -> Self {
        self.operators.push(Stage::new(Box::new(operator) as Box<dyn Operator>, timing));
        self
    }

    pub fn constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints
            .push(Stage::new(Box::new(constraint) as Box<dyn Constraint>, OperatorTiming::default()));
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers
            .push(Stage::new(Box::new(renderer) as Box<dyn Renderer>, OperatorTiming::default()));
        self
    }

    /// Attach a child effect started together with the parent
    pub fn child(self, definition: Arc<ParticleSystemDefinition>) -> Self {
        self.child_with_delay(definition, 0.0)
    }

    /// Attach a child effect started `delay` seconds after the parent
    pub fn child_with_delay(mut self, definition: Arc<ParticleSystemDefinition>, delay: f32) -> Self {
        self.children.push(ChildDefinition {
            definition,
            delay: delay.max(0.0),
        });
        self
    }

    /// Bind a sheet
    pub fn sheet(mut self, sheet: Arc<Sheet>) -> Self {
        self.sheet = Some(sheet);
        self
    }

    /// Validate the pipeline and compute its masks
    pub fn build(self) -> Result<ParticleSystemDefinition> {
        self.config.validate()?;

        let mut masks = DefinitionMasks::default();
        let mut available =
            AttributeMask::INPUTS | AttributeMask::XYZ | AttributeMask::PREV_XYZ;

        for stage in &self.emitters {
            check_stage(stage.op.as_ref(), available)?;
            masks.initialized |= stage.op.written_attributes();
            masks.add(stage.op.as_ref());
        }
        available |= masks.initialized;

        // Override initializers run after the regular ones
        let (regular, overrides): (Vec<_>, Vec<_>) = self
            .initializers
            .iter()
            .partition(|stage| !stage.op.init_multiple_override());
        for stage in regular.into_iter().chain(overrides) {
            check_stage(stage.op.as_ref(), available)?;
            available |= stage.op.written_attributes();
            masks.initialized |= stage.op.written_attributes();
            masks.add(stage.op.as_ref());
        }

        let later = self
            .operators
            .iter()
            .map(|stage| stage.op.as_ref() as &dyn OperatorInfo)
            .chain(self.constraints.iter().map(|stage| stage.op.as_ref() as &dyn OperatorInfo))
            .chain(self.renderers.iter().map(|stage| stage.op.as_ref() as &dyn OperatorInfo));
        for op in later {
            check_stage(op, available)?;
            available |= op.written_attributes();
            masks.updated |= op.written_attributes();
            masks.add(op);
        }

        // Particle ids are assigned at spawn and may only be read back from
        // their spawn-time copy
        if masks.read.has(ParticleAttribute::ParticleId) {
            masks.initialized |= AttributeMask::PARTICLE_ID;
            masks.read_initial |= AttributeMask::PARTICLE_ID;
        }

        debug!(
            "Built particle system '{}': {} emitters, {} initializers, {} operators, {} constraints, {} renderers, {} children, per-particle {:?}",
            self.name,
            self.emitters.len(),
            self.initializers.len(),
            self.operators.len(),
            self.constraints.len(),
            self.renderers.len(),
            self.children.len(),
            masks.per_particle()
        );

        Ok(ParticleSystemDefinition {
            name: self.name,
            config: self.config,
            emitters: self.emitters,
            initializers: self.initializers,
            operators: self.operators,
            constraints: self.constraints,
            renderers: self.renderers,
            children: self.children,
            sheet: self.sheet,
            masks,
        })
    }
}

fn check_stage(op: &dyn OperatorInfo, available: AttributeMask) -> Result<()> {
    op.validate()?;
    let missing = op.read_attributes() - available;
    match missing.attributes().next() {
        Some(attribute) => Err(ParticleError::UnwrittenAttribute {
            operator: op.name(),
            attribute,
        }),
        None => Ok(()),
    }
}
