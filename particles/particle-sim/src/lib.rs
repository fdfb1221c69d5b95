//! Structure-of-arrays particle simulation.
//!
//! A [`ParticleSystemDefinition`] lists the stages of an effect: emitters
//! spawn particles, initializers fill their attributes once, operators
//! update them every step, constraints pull positions back into bounds and
//! renderers turn the result into [`SpriteQuad`]s. A [`ParticleCollection`]
//! runs one instance of a definition against a set of control points.
//!
//! Attributes live in an [`AttributeStore`], one column per attribute,
//! padded to blocks of four so operators can work a block at a time through
//! the [`batch`] types.
//!
//! ```rust,ignore
//! use particle_sim::prelude::*;
//! use std::sync::Arc;
//!
//! let definition = ParticleSystemDefinition::builder("sparks")
//!     .emitter(ContinuousEmitter::new(ContinuousEmitterConfig {
//!         emission_rate: 50.0,
//!         ..Default::default()
//!     }))
//!     .initializer(CreateWithinSphere::default())
//!     .initializer(RandomLifetime::new(RandomRange::new(0.5, 1.0)))
//!     .operator(BasicMovement::new(BasicMovementConfig {
//!         gravity: Vec3::new(0.0, 0.0, -400.0),
//!         drag: 0.05,
//!     }))
//!     .operator(LifespanDecay)
//!     .renderer(SpriteRenderer::default())
//!     .build()?;
//!
//! let mut sparks = ParticleCollection::new(Arc::new(definition), Arc::new(SimulationContext::new()))?;
//! sparks.set_control_point_position(0, Vec3::new(0.0, 0.0, 64.0))?;
//! sparks.simulate(1.0 / 60.0);
//!
//! let mut quads = Vec::new();
//! sparks.render(&mut quads);
//! ```

pub mod attributes;
pub mod batch;
pub mod collection;
pub mod collision;
pub mod config;
pub mod constraints;
pub mod control_points;
pub mod definition;
pub mod emitters;
pub mod error;
pub mod initializers;
pub mod operator;
pub mod operators;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod path;
pub mod random;
pub mod renderers;
pub mod state;
pub mod store;

pub use attributes::{ATTRIBUTE_COUNT, AttributeKind, AttributeMask, FilterGroup, ParticleAttribute};
pub use collection::{ParticleCollection, RestartMode};
pub use collision::{
    CachedPlane, CollisionCache, CollisionMode, EmptyWorld, TraceParams, TraceResult, WorldQuery,
};
pub use config::{OperatorTiming, SimulationConfig};
pub use control_points::{ControlPoint, ControlPointSet, ControlPointSource, MAX_CONTROL_POINTS};
pub use definition::{DefinitionBuilder, ParticleSystemDefinition};
pub use error::{ParticleError, Result};
pub use operator::{
    Constraint, Emitter, Initializer, Operator, OperatorContext, OperatorInfo, RenderSink,
    Renderer, SpriteQuad,
};
pub use path::{BulgeControl, PathParams, PathValues};
pub use state::{ParticleState, SimulationClock, SimulationContext};
pub use store::{AttributeStore, MAX_PARTICLES_IN_A_SYSTEM};

/// Everything needed to assemble and run an effect
pub mod prelude {
    pub use crate::attributes::{AttributeMask, ParticleAttribute};
    pub use crate::collection::{ParticleCollection, RestartMode};
    pub use crate::config::{OperatorTiming, SimulationConfig};
    pub use crate::constraints::*;
    pub use crate::definition::ParticleSystemDefinition;
    pub use crate::emitters::*;
    pub use crate::error::{ParticleError, Result};
    pub use crate::initializers::*;
    pub use crate::operator::{RenderSink, SpriteQuad};
    pub use crate::operators::*;
    pub use crate::renderers::*;
    pub use crate::state::SimulationContext;
    pub use glam::Vec3;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
