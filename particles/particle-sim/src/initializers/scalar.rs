//! Random scalar, vector, rotation and colour initializers

use glam::Vec3;

use super::{RandomRange, init_block_random_range_exp, init_scalar_random_range_exp};
use crate::attributes::{AttributeKind, AttributeMask, ParticleAttribute};
use crate::error::{ParticleError, Result};
use crate::operator::{Initializer, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

/// Random value for any scalar attribute
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomScalarConfig {
    pub attribute: ParticleAttribute,
    pub range: RandomRange,
}

impl Default for RandomScalarConfig {
    fn default() -> Self {
        Self {
            attribute: ParticleAttribute::Radius,
            range: RandomRange::default(),
        }
    }
}

/// Writes a random value from a range into a scalar attribute
#[derive(Debug, Clone, Default)]
pub struct RandomScalar {
    config: RandomScalarConfig,
}

impl RandomScalar {
    pub fn new(config: RandomScalarConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for RandomScalar {
    fn name(&self) -> &'static str {
        "Scalar Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        self.config.attribute.mask()
    }

    fn read_attributes(&self) -> AttributeMask {
        self.config.range.read_attributes()
    }

    fn validate(&self) -> Result<()> {
        if self.config.attribute.kind() != AttributeKind::Float {
            return Err(ParticleError::InvalidConfig(format!(
                "{} is not a scalar attribute",
                self.config.attribute.name()
            )));
        }
        Ok(())
    }
}

impl Initializer for RandomScalar {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_scalar_random_range_exp(
            state,
            self.config.attribute,
            &self.config.range,
            start,
            count,
            ctx.strength(),
        );
    }

    fn init_block(
        &self,
        state: &mut ParticleState,
        start_block: usize,
        block_count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_block_random_range_exp(
            state,
            self.config.attribute,
            &self.config.range,
            start_block,
            block_count,
            ctx.strength(),
        );
    }
}

/// Random lifetime in seconds
#[derive(Debug, Clone, Default)]
pub struct RandomLifetime {
    range: RandomRange,
}

impl RandomLifetime {
    pub fn new(range: RandomRange) -> Self {
        Self { range }
    }
}

impl OperatorInfo for RandomLifetime {
    fn name(&self) -> &'static str {
        "Lifetime Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::LIFE_DURATION
    }

    fn read_attributes(&self) -> AttributeMask {
        self.range.read_attributes()
    }
}

impl Initializer for RandomLifetime {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_scalar_random_range_exp(
            state,
            ParticleAttribute::LifeDuration,
            &self.range,
            start,
            count,
            ctx.strength(),
        );
    }

    fn init_block(
        &self,
        state: &mut ParticleState,
        start_block: usize,
        block_count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_block_random_range_exp(
            state,
            ParticleAttribute::LifeDuration,
            &self.range,
            start_block,
            block_count,
            ctx.strength(),
        );
    }
}

/// Random radius
#[derive(Debug, Clone)]
pub struct RandomRadius {
    range: RandomRange,
}

impl Default for RandomRadius {
    fn default() -> Self {
        Self::new(RandomRange::new(1.0, 1.0))
    }
}

impl RandomRadius {
    pub fn new(range: RandomRange) -> Self {
        Self { range }
    }
}

impl OperatorInfo for RandomRadius {
    fn name(&self) -> &'static str {
        "Radius Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::RADIUS
    }

    fn read_attributes(&self) -> AttributeMask {
        self.range.read_attributes()
    }
}

impl Initializer for RandomRadius {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_scalar_random_range_exp(
            state,
            ParticleAttribute::Radius,
            &self.range,
            start,
            count,
            ctx.strength(),
        );
    }

    fn init_block(
        &self,
        state: &mut ParticleState,
        start_block: usize,
        block_count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_block_random_range_exp(
            state,
            ParticleAttribute::Radius,
            &self.range,
            start_block,
            block_count,
            ctx.strength(),
        );
    }
}

/// Random trail length
#[derive(Debug, Clone)]
pub struct RandomTrailLength {
    range: RandomRange,
}

impl Default for RandomTrailLength {
    fn default() -> Self {
        Self::new(RandomRange::new(0.1, 0.1))
    }
}

impl RandomTrailLength {
    pub fn new(range: RandomRange) -> Self {
        Self { range }
    }
}

impl OperatorInfo for RandomTrailLength {
    fn name(&self) -> &'static str {
        "Trail Length Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::TRAIL_LENGTH
    }

    fn read_attributes(&self) -> AttributeMask {
        self.range.read_attributes()
    }
}

impl Initializer for RandomTrailLength {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_scalar_random_range_exp(
            state,
            ParticleAttribute::TrailLength,
            &self.range,
            start,
            count,
            ctx.strength(),
        );
    }

    fn init_block(
        &self,
        state: &mut ParticleState,
        start_block: usize,
        block_count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_block_random_range_exp(
            state,
            ParticleAttribute::TrailLength,
            &self.range,
            start_block,
            block_count,
            ctx.strength(),
        );
    }
}

/// Random opacity, authored as 0-255
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomAlphaConfig {
    pub alpha_min: u8,
    pub alpha_max: u8,
    pub exponent: f32,
}

impl Default for RandomAlphaConfig {
    fn default() -> Self {
        Self {
            alpha_min: 255,
            alpha_max: 255,
            exponent: 1.0,
        }
    }
}

/// Writes a random opacity
#[derive(Debug, Clone)]
pub struct RandomAlpha {
    range: RandomRange,
}

impl Default for RandomAlpha {
    fn default() -> Self {
        Self::new(RandomAlphaConfig::default())
    }
}

impl RandomAlpha {
    pub fn new(config: RandomAlphaConfig) -> Self {
        let range = RandomRange::new(
            f32::from(config.alpha_min) / 255.0,
            f32::from(config.alpha_max) / 255.0,
        )
        .with_exponent(config.exponent);
        Self { range }
    }
}

impl OperatorInfo for RandomAlpha {
    fn name(&self) -> &'static str {
        "Alpha Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::ALPHA
    }
}

impl Initializer for RandomAlpha {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_scalar_random_range_exp(
            state,
            ParticleAttribute::Alpha,
            &self.range,
            start,
            count,
            ctx.strength(),
        );
    }

    fn init_block(
        &self,
        state: &mut ParticleState,
        start_block: usize,
        block_count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        init_block_random_range_exp(
            state,
            ParticleAttribute::Alpha,
            &self.range,
            start_block,
            block_count,
            ctx.strength(),
        );
    }
}

/// Angle attribute a [`RandomRotation`] writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum RotationAttribute {
    /// Roll
    #[default]
    Rotation,
    /// Roll speed
    RotationSpeed,
    /// Yaw
    Yaw,
}

impl RotationAttribute {
    fn attribute(self) -> ParticleAttribute {
        match self {
            Self::Rotation => ParticleAttribute::Rotation,
            Self::RotationSpeed => ParticleAttribute::RotationSpeed,
            Self::Yaw => ParticleAttribute::Yaw,
        }
    }
}

/// Random angle, authored in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomRotationConfig {
    pub attribute: RotationAttribute,
    /// Added to every value
    pub initial: f32,
    pub min: f32,
    pub max: f32,
    pub exponent: f32,
    /// Negate half of the values at random
    pub random_flip: bool,
}

impl Default for RandomRotationConfig {
    fn default() -> Self {
        Self {
            attribute: RotationAttribute::Rotation,
            initial: 0.0,
            min: 0.0,
            max: 360.0,
            exponent: 1.0,
            random_flip: true,
        }
    }
}

impl RandomRotationConfig {
    /// Yaw defaults: no random flip
    pub fn yaw() -> Self {
        Self {
            attribute: RotationAttribute::Yaw,
            random_flip: false,
            ..Default::default()
        }
    }
}

/// Writes a random roll, roll speed or yaw in radians
#[derive(Debug, Clone, Default)]
pub struct RandomRotation {
    config: RandomRotationConfig,
}

impl RandomRotation {
    pub fn new(config: RandomRotationConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for RandomRotation {
    fn name(&self) -> &'static str {
        match self.config.attribute {
            RotationAttribute::Rotation => "Rotation",
            RotationAttribute::RotationSpeed => "Rotation Speed Random",
            RotationAttribute::Yaw => "Rotation Yaw Random",
        }
    }

    fn written_attributes(&self) -> AttributeMask {
        self.config.attribute.attribute().mask()
    }
}

impl Initializer for RandomRotation {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        let attribute = config.attribute.attribute();
        let initial = config.initial.to_radians();
        let (min, max) = (config.min.to_radians(), config.max.to_radians());

        for particle in start..start + count {
            let mut angle = initial + state.random.random_float_exp(min, max, config.exponent);
            if config.random_flip && state.random.random_float(-1.0, 1.0) < 0.0 {
                angle = -angle;
            }
            state.store.set_float(attribute, particle, angle);
        }
    }
}

/// Random tint between two colours, RGBA 0-255
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomColorConfig {
    pub color1: [u8; 4],
    pub color2: [u8; 4],
}

impl Default for RandomColorConfig {
    fn default() -> Self {
        Self {
            color1: [255, 255, 255, 255],
            color2: [255, 255, 255, 255],
        }
    }
}

fn rgb(color: [u8; 4]) -> Vec3 {
    Vec3::new(f32::from(color[0]), f32::from(color[1]), f32::from(color[2])) / 255.0
}

/// Writes a tint somewhere on the line between two colours
#[derive(Debug, Clone, Default)]
pub struct RandomColor {
    config: RandomColorConfig,
}

impl RandomColor {
    pub fn new(config: RandomColorConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for RandomColor {
    fn name(&self) -> &'static str {
        "Color Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::TINT_RGB
    }
}

impl Initializer for RandomColor {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let (from, to) = (rgb(self.config.color1), rgb(self.config.color2));
        for particle in start..start + count {
            let t = state.random.random_float(0.0, 1.0);
            state
                .store
                .set_vector(ParticleAttribute::TintRgb, particle, from.lerp(to, t));
        }
    }
}

/// Random value for any vector attribute
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RandomVectorConfig {
    pub attribute: ParticleAttribute,
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for RandomVectorConfig {
    fn default() -> Self {
        Self {
            attribute: ParticleAttribute::Xyz,
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

/// Writes a vector with each component drawn from its own range
#[derive(Debug, Clone, Default)]
pub struct RandomVector {
    config: RandomVectorConfig,
}

impl RandomVector {
    pub fn new(config: RandomVectorConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for RandomVector {
    fn name(&self) -> &'static str {
        "Vector Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        self.config.attribute.mask()
    }

    fn validate(&self) -> Result<()> {
        if self.config.attribute.kind() != AttributeKind::Vector {
            return Err(ParticleError::InvalidConfig(format!(
                "{} is not a vector attribute",
                self.config.attribute.name()
            )));
        }
        Ok(())
    }
}

impl Initializer for RandomVector {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        for particle in start..start + count {
            let value = state.random.random_vector(self.config.min, self.config.max);
            state.store.set_vector(self.config.attribute, particle, value);
        }
    }
}
