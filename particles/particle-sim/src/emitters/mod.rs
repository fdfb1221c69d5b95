//! Built-in emitters
//!
//! Emitters only decide how many particles appear and when. Everything else
//! about a new particle comes from the initializers that run right after.

mod continuous;
mod instantaneous;
mod parent_death;

pub use continuous::{ContinuousEmitter, ContinuousEmitterConfig};
pub use instantaneous::{InstantaneousEmitter, InstantaneousEmitterConfig};
pub use parent_death::{ParentDeathEmitter, ParentDeathEmitterConfig};
