//! Children born where parent particles die

use std::any::Any;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::operator::{Emitter, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// How much of the dying parent's motion a child keeps
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct ParentDeathEmitterConfig {
    /// 0 spawns children at rest, 1 with the parent's last velocity
    pub inherit_velocity_scale: f32,
}

/// Spawns one particle per parent particle on the parent's kill list
///
/// Only runs while the parent applies its kill list. The children start at
/// the dying parents' positions.
#[derive(Debug, Clone, Default)]
pub struct ParentDeathEmitter {
    config: ParentDeathEmitterConfig,
}

impl ParentDeathEmitter {
    pub fn new(config: ParentDeathEmitterConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for ParentDeathEmitter {
    fn name(&self) -> &'static str {
        "Emit on Parent Death"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }
}

impl Emitter for ParentDeathEmitter {
    fn emit(
        &self,
        state: &mut ParticleState,
        _strength: f32,
        ctx: &mut OperatorContext<'_>,
    ) -> AttributeMask {
        if !ctx.applying_parent_kill_list() {
            return AttributeMask::empty();
        }
        let Some(parent) = ctx.parent() else {
            return AttributeMask::empty();
        };
        let dying = parent.kill_list();
        if dying.is_empty() {
            return AttributeMask::empty();
        }

        let spawned = state.spawn(dying.len());
        for (particle, &source) in spawned.zip(dying) {
            let position = parent.store.vector(ParticleAttribute::Xyz, source);
            let parent_prev = parent.store.vector(ParticleAttribute::PrevXyz, source);
            let previous = position.lerp(parent_prev, self.config.inherit_velocity_scale);
            state
                .store
                .set_vector(ParticleAttribute::Xyz, particle, position);
            state
                .store
                .set_vector(ParticleAttribute::PrevXyz, particle, previous);
        }
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn may_create_more_particles(
        &self,
        _state: &ParticleState,
        _data: Option<&(dyn Any + Send + Sync + 'static)>,
    ) -> bool {
        false
    }

    fn should_run(&self, applying_parent_kill_list: bool) -> bool {
        applying_parent_kill_list
    }
}
