//! Built-in per-step operators

mod fade;
mod movement;

pub use fade::{AlphaFade, AlphaFadeConfig, RadiusScale, RadiusScaleConfig, RotationSpin, RotationSpinConfig};
pub use movement::{BasicMovement, BasicMovementConfig, LifespanDecay};

use crate::attributes::ParticleAttribute;
use crate::state::ParticleState;

/// Fraction of its lifetime a particle has lived, 1 or more once expired
pub(crate) fn life_fraction(state: &ParticleState, particle: usize) -> f32 {
    let age = state.clock.cur_time - state.store.float(ParticleAttribute::CreationTime, particle);
    let lifetime = state.store.float(ParticleAttribute::LifeDuration, particle);
    if lifetime > 0.0 {
        age / lifetime
    } else {
        1.0
    }
}
