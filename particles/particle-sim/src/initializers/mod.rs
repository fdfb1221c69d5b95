//! Built-in initializers
//!
//! Initializers fill the attributes of freshly spawned particles. Most of
//! the simple ones draw a value from a [`RandomRange`]; the helpers here run
//! that draw over a particle range (scalar path) or over whole batches
//! (block path).

mod collision;
mod parent;
mod position;
mod scalar;
mod sequence;
mod velocity;

pub use collision::{LifespanFromVelocity, LifespanFromVelocityConfig};
pub use parent::{
    CreateFromParentParticles, CreateFromParentParticlesConfig, CreateFromPlaneCache,
    CreateFromPlaneCacheConfig,
};
pub use position::{
    CreateAlongPath, CreateAlongPathConfig, CreateSequentialPath, CreateSequentialPathConfig,
    CreateWithinSphere, CreateWithinSphereConfig, MoveBetweenPoints, MoveBetweenPointsConfig,
    PositionOffset, PositionOffsetConfig,
};
pub use scalar::{
    RandomAlpha, RandomAlphaConfig, RandomColor, RandomColorConfig, RandomLifetime, RandomRadius,
    RandomRotation, RandomRotationConfig, RandomScalar, RandomScalarConfig, RandomTrailLength,
    RandomVector, RandomVectorConfig, RotationAttribute,
};
pub use sequence::{
    RandomSequence, RandomSequenceConfig, SequenceLifetime, SequenceLifetimeConfig, SequenceOrder,
};
pub use velocity::{
    InheritVelocity, InheritVelocityConfig, VelocityRandom, VelocityRandomConfig,
};

use std::sync::Arc;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::batch::{F32x4, FourInts, LANES};
use crate::state::ParticleState;

/// Where random values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum RandomMode {
    /// Fresh values per spawn: the collection stream on the scalar path, a
    /// pooled generator on the block path
    #[default]
    Varying,
    /// Values addressed by particle id, so a particle gets the same value
    /// every time it is initialised and both paths agree
    Constant,
}

/// Random float range with an exponent bias
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomRange {
    pub min: f32,
    pub max: f32,
    /// `min + rand^exponent * (max - min)`
    pub exponent: f32,
    pub mode: RandomMode,
    /// Negate half of the values at random
    pub random_invert: bool,
    /// Sample id offset for constant mode, keeps ranges of different
    /// initializers uncorrelated
    pub sample_offset: u32,
}

impl Default for RandomRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            exponent: 1.0,
            mode: RandomMode::Varying,
            random_invert: false,
            sample_offset: 0,
        }
    }
}

impl RandomRange {
    /// Uniform range in varying mode
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    /// Same range with a different exponent
    pub fn with_exponent(mut self, exponent: f32) -> Self {
        self.exponent = exponent;
        self
    }

    /// Same range drawn in constant mode
    pub fn constant(mut self, sample_offset: u32) -> Self {
        self.mode = RandomMode::Constant;
        self.sample_offset = sample_offset;
        self
    }

    /// Attributes the range reads to pick its values
    pub fn read_attributes(&self) -> AttributeMask {
        match self.mode {
            RandomMode::Constant => AttributeMask::PARTICLE_ID,
            RandomMode::Varying => AttributeMask::empty(),
        }
    }

    fn scaled(&self, strength: f32) -> (f32, f32) {
        (self.min * strength, self.max * strength)
    }

    /// One value for a particle
    pub fn sample(&self, state: &mut ParticleState, particle: usize, strength: f32) -> f32 {
        let (min, max) = self.scaled(strength);
        match self.mode {
            RandomMode::Constant => {
                let id = sample_id(state, particle, self.sample_offset);
                let value = state.random.random_float_exp_at(id, min, max, self.exponent);
                if self.random_invert && state.random.unit_at(id.wrapping_add(1)) < 0.5 {
                    -value
                } else {
                    value
                }
            }
            RandomMode::Varying => {
                let value = if self.exponent == 1.0 {
                    state.random.random_float(min, max)
                } else {
                    state.random.random_float_exp(min, max, self.exponent)
                };
                if self.random_invert && state.random.random_float(0.0, 1.0) < 0.5 {
                    -value
                } else {
                    value
                }
            }
        }
    }
}

fn sample_id(state: &ParticleState, particle: usize, offset: u32) -> u32 {
    let id = state
        .store
        .int(ParticleAttribute::ParticleId, particle) as u32;
    id.wrapping_add(offset)
        .wrapping_add(state.operator_random_offset())
}

/// Fill a scalar attribute of particles `start..start + count` from a range
pub fn init_scalar_random_range_exp(
    state: &mut ParticleState,
    attribute: ParticleAttribute,
    range: &RandomRange,
    start: usize,
    count: usize,
    strength: f32,
) {
    for particle in start..start + count {
        let value = range.sample(state, particle, strength);
        state.store.set_float(attribute, particle, value);
    }
}

/// Fill a scalar attribute of whole batches from a range
pub fn init_block_random_range_exp(
    state: &mut ParticleState,
    attribute: ParticleAttribute,
    range: &RandomRange,
    start_block: usize,
    block_count: usize,
    strength: f32,
) {
    let (min, max) = range.scaled(strength);
    let span = max - min;

    match range.mode {
        RandomMode::Constant => {
            let offset = range
                .sample_offset
                .wrapping_add(state.operator_random_offset());
            for block in start_block..start_block + block_count {
                let ids = initial_ids(state, block);
                let mut value = state.random.unit_x4(ids, offset).powf(range.exponent) * span + min;
                if range.random_invert {
                    let flip = state.random.unit_x4(ids, offset.wrapping_add(1));
                    value = value.select(flip.lt(F32x4::splat(0.5)), -value);
                }
                state.store.set_float4(attribute, block, value);
            }
        }
        RandomMode::Varying => {
            let context = Arc::clone(state.context_arc());
            let mut generator = context.rand_pool().checkout();
            for block in start_block..start_block + block_count {
                let mut value = generator.next_x4().powf(range.exponent) * span + min;
                if range.random_invert {
                    let flip = generator.next_x4();
                    value = value.select(flip.lt(F32x4::splat(0.5)), -value);
                }
                state.store.set_float4(attribute, block, value);
            }
        }
    }
}

fn initial_ids(state: &ParticleState, block: usize) -> FourInts {
    FourInts(std::array::from_fn(|lane| {
        state
            .store
            .int(ParticleAttribute::ParticleId, block * LANES + lane)
    }))
}
