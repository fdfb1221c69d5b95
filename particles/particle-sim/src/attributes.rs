//! Particle attribute catalogue
//!
//! Every per-particle field has a fixed index. Operators declare the fields
//! they touch as [`AttributeMask`]s, and the collection allocates storage only
//! for the fields some operator writes.

use bitflags::bitflags;

/// Number of attribute kinds
pub const ATTRIBUTE_COUNT: usize = 24;

/// Storage shape of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// One float per particle
    Float,
    /// One integer per particle
    Int,
    /// Three floats per particle, stored component-interleaved in batches of 4
    Vector,
}

impl AttributeKind {
    /// Floats (or ints) used per particle
    pub fn width(self) -> usize {
        match self {
            Self::Float | Self::Int => 1,
            Self::Vector => 3,
        }
    }
}

/// A per-particle field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ParticleAttribute {
    /// Current position
    Xyz = 0,
    /// Lifetime in seconds
    LifeDuration = 1,
    /// Position at the previous step; the difference to `Xyz` is the velocity
    PrevXyz = 2,
    /// Radius
    Radius = 3,
    /// Roll in radians
    Rotation = 4,
    /// Roll speed in radians per second
    RotationSpeed = 5,
    /// Colour tint
    TintRgb = 6,
    /// Opacity
    Alpha = 7,
    /// Simulation time the particle was created at
    CreationTime = 8,
    /// Sheet sequence index
    SequenceNumber = 9,
    /// Trail length for stretched sprites
    TrailLength = 10,
    /// Stable random id
    ParticleId = 11,
    /// Yaw in radians
    Yaw = 12,
    /// Second sheet sequence index
    SequenceNumber1 = 13,
    /// Hitbox the particle is attached to
    HitboxIndex = 14,
    /// Position relative to the attached hitbox
    HitboxRelativeXyz = 15,
    /// Second opacity channel
    Alpha2 = 16,
    /// Free vector scratch space
    ScratchVec = 17,
    /// Free scalar scratch space
    ScratchFloat = 18,
    /// Reserved
    Unused = 19,
    /// Pitch in radians
    Pitch = 20,
    /// Surface normal
    Normal = 21,
    /// Glow colour
    GlowRgb = 22,
    /// Glow opacity
    GlowAlpha = 23,
}

impl ParticleAttribute {
    /// All attributes in index order
    pub const ALL: [Self; ATTRIBUTE_COUNT] = [
        Self::Xyz,
        Self::LifeDuration,
        Self::PrevXyz,
        Self::Radius,
        Self::Rotation,
        Self::RotationSpeed,
        Self::TintRgb,
        Self::Alpha,
        Self::CreationTime,
        Self::SequenceNumber,
        Self::TrailLength,
        Self::ParticleId,
        Self::Yaw,
        Self::SequenceNumber1,
        Self::HitboxIndex,
        Self::HitboxRelativeXyz,
        Self::Alpha2,
        Self::ScratchVec,
        Self::ScratchFloat,
        Self::Unused,
        Self::Pitch,
        Self::Normal,
        Self::GlowRgb,
        Self::GlowAlpha,
    ];

    /// Fixed attribute index
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Attribute for an index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Storage shape
    pub fn kind(self) -> AttributeKind {
        if AttributeMask::VECTORS.contains(self.mask()) {
            AttributeKind::Vector
        } else if AttributeMask::INTS.contains(self.mask()) {
            AttributeKind::Int
        } else {
            AttributeKind::Float
        }
    }

    /// Single-bit mask for this attribute
    #[inline]
    pub fn mask(self) -> AttributeMask {
        AttributeMask::from_bits_retain(1 << self.index())
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Xyz => "Position",
            Self::LifeDuration => "Life Duration",
            Self::PrevXyz => "Previous Position",
            Self::Radius => "Radius",
            Self::Rotation => "Roll",
            Self::RotationSpeed => "Roll Speed",
            Self::TintRgb => "Color",
            Self::Alpha => "Alpha",
            Self::CreationTime => "Creation Time",
            Self::SequenceNumber => "Sequence Number",
            Self::TrailLength => "Trail Length",
            Self::ParticleId => "Particle ID",
            Self::Yaw => "Yaw",
            Self::SequenceNumber1 => "Sequence Number 1",
            Self::HitboxIndex => "Hitbox Index",
            Self::HitboxRelativeXyz => "Hitbox Offset Position",
            Self::Alpha2 => "Alpha Alternate",
            Self::ScratchVec => "Scratch Vector",
            Self::ScratchFloat => "Scratch Float",
            Self::Unused => "Unused",
            Self::Pitch => "Pitch",
            Self::Normal => "Normal",
            Self::GlowRgb => "Glow RGB",
            Self::GlowAlpha => "Glow Alpha",
        }
    }
}

bitflags! {
    /// Set of attributes, one bit per [`ParticleAttribute`] index
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
    pub struct AttributeMask: u32 {
        const XYZ = 1 << 0;
        const LIFE_DURATION = 1 << 1;
        const PREV_XYZ = 1 << 2;
        const RADIUS = 1 << 3;
        const ROTATION = 1 << 4;
        const ROTATION_SPEED = 1 << 5;
        const TINT_RGB = 1 << 6;
        const ALPHA = 1 << 7;
        const CREATION_TIME = 1 << 8;
        const SEQUENCE_NUMBER = 1 << 9;
        const TRAIL_LENGTH = 1 << 10;
        const PARTICLE_ID = 1 << 11;
        const YAW = 1 << 12;
        const SEQUENCE_NUMBER1 = 1 << 13;
        const HITBOX_INDEX = 1 << 14;
        const HITBOX_RELATIVE_XYZ = 1 << 15;
        const ALPHA2 = 1 << 16;
        const SCRATCH_VEC = 1 << 17;
        const SCRATCH_FLOAT = 1 << 18;
        const UNUSED = 1 << 19;
        const PITCH = 1 << 20;
        const NORMAL = 1 << 21;
        const GLOW_RGB = 1 << 22;
        const GLOW_ALPHA = 1 << 23;

        /// Attributes stored as three floats
        const VECTORS = Self::XYZ.bits()
            | Self::PREV_XYZ.bits()
            | Self::TINT_RGB.bits()
            | Self::HITBOX_RELATIVE_XYZ.bits()
            | Self::SCRATCH_VEC.bits()
            | Self::NORMAL.bits()
            | Self::GLOW_RGB.bits();

        /// Attributes stored as integers
        const INTS = Self::PARTICLE_ID.bits() | Self::HITBOX_INDEX.bits();

        /// Attributes the collection provides without an operator writing them
        const INPUTS = Self::CREATION_TIME.bits() | Self::PARTICLE_ID.bits();

        /// Attributes that always get per-particle storage
        const ALWAYS_PER_PARTICLE = Self::XYZ.bits()
            | Self::PREV_XYZ.bits()
            | Self::CREATION_TIME.bits();
    }
}

impl AttributeMask {
    /// Attributes in this mask, in index order
    pub fn attributes(self) -> impl Iterator<Item = ParticleAttribute> {
        ParticleAttribute::ALL
            .into_iter()
            .filter(move |attribute| self.contains(attribute.mask()))
    }

    /// Whether the mask names the attribute
    #[inline]
    pub fn has(self, attribute: ParticleAttribute) -> bool {
        self.contains(attribute.mask())
    }
}

impl From<ParticleAttribute> for AttributeMask {
    fn from(attribute: ParticleAttribute) -> Self {
        attribute.mask()
    }
}

/// Tool-facing grouping of operators by the attributes they write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterGroup {
    /// Position and velocity
    PositionAndVelocity,
    /// Lifetime
    Lifetime,
    /// Rotation
    Rotation,
    /// Radius and trail length
    Size,
    /// Colour and opacity
    ColorAndOpacity,
    /// Sheet sequences
    AnimationSequence,
    /// Hitbox attachment
    Hitbox,
    /// Surface normal
    Normal,
}

impl FilterGroup {
    /// All groups in display order
    pub const ALL: [Self; 8] = [
        Self::PositionAndVelocity,
        Self::Lifetime,
        Self::Rotation,
        Self::Size,
        Self::ColorAndOpacity,
        Self::AnimationSequence,
        Self::Hitbox,
        Self::Normal,
    ];

    /// Attributes belonging to the group
    pub fn mask(self) -> AttributeMask {
        match self {
            Self::PositionAndVelocity => AttributeMask::XYZ | AttributeMask::PREV_XYZ,
            Self::Lifetime => AttributeMask::LIFE_DURATION,
            Self::Rotation => {
                AttributeMask::ROTATION
                    | AttributeMask::ROTATION_SPEED
                    | AttributeMask::YAW
                    | AttributeMask::PITCH
            }
            Self::Size => AttributeMask::RADIUS | AttributeMask::TRAIL_LENGTH,
            Self::ColorAndOpacity => {
                AttributeMask::TINT_RGB
                    | AttributeMask::ALPHA
                    | AttributeMask::ALPHA2
                    | AttributeMask::GLOW_RGB
                    | AttributeMask::GLOW_ALPHA
            }
            Self::AnimationSequence => {
                AttributeMask::SEQUENCE_NUMBER | AttributeMask::SEQUENCE_NUMBER1
            }
            Self::Hitbox => AttributeMask::HITBOX_INDEX | AttributeMask::HITBOX_RELATIVE_XYZ,
            Self::Normal => AttributeMask::NORMAL,
        }
    }

    /// Groups touched by a written-attribute mask
    pub fn for_written(written: AttributeMask) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|group| group.mask().intersects(written))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_masks() {
        for (index, attribute) in ParticleAttribute::ALL.into_iter().enumerate() {
            assert_eq!(attribute.index(), index);
            assert_eq!(attribute.mask().bits(), 1 << index);
            assert_eq!(ParticleAttribute::from_index(index), Some(attribute));
        }
        assert_eq!(ParticleAttribute::from_index(ATTRIBUTE_COUNT), None);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ParticleAttribute::Xyz.kind(), AttributeKind::Vector);
        assert_eq!(ParticleAttribute::GlowRgb.kind(), AttributeKind::Vector);
        assert_eq!(ParticleAttribute::ParticleId.kind(), AttributeKind::Int);
        assert_eq!(ParticleAttribute::Radius.kind(), AttributeKind::Float);
        assert_eq!(ParticleAttribute::Normal.kind().width(), 3);
    }

    #[test]
    fn test_mask_iteration() {
        let mask = AttributeMask::RADIUS | AttributeMask::XYZ;
        let attributes: Vec<_> = mask.attributes().collect();
        assert_eq!(
            attributes,
            vec![ParticleAttribute::Xyz, ParticleAttribute::Radius]
        );
    }

    #[test]
    fn test_filter_groups() {
        let groups = FilterGroup::for_written(AttributeMask::PREV_XYZ | AttributeMask::ALPHA);
        assert_eq!(
            groups,
            vec![
                FilterGroup::PositionAndVelocity,
                FilterGroup::ColorAndOpacity
            ]
        );
    }
}
