//! Sample table entries and per-sequence flags

use bitflags::bitflags;

/// Number of pre-interpolated samples stored for every multi-frame sequence.
///
/// A power of two so looping sequences wrap with a mask.
pub const SEQUENCE_SAMPLE_COUNT: usize = 512;

/// Images stored per frame in a version 1+ sheet file
pub const MAX_IMAGES_PER_FRAME_ON_DISK: usize = 4;

/// Images kept per frame after loading
pub const MAX_IMAGES_PER_FRAME_IN_MEMORY: usize = 2;

bitflags! {
    /// Flags stored in the low byte of a sequence entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
    pub struct SequenceFlags: u8 {
        /// Hold the last frame instead of looping
        const CLAMP = 0x01;
        /// Sequence carries no alpha channel
        const NO_ALPHA = 0x02;
        /// Sequence carries no color channels
        const NO_COLOR = 0x04;
    }
}

/// Texture rectangle of one image in an authored frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameRect {
    /// Left U coordinate
    pub left: f32,
    /// Top V coordinate
    pub top: f32,
    /// Right U coordinate
    pub right: f32,
    /// Bottom V coordinate
    pub bottom: f32,
}

impl FrameRect {
    /// The whole texture
    pub const UNIT: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    /// Create a rectangle from its edges
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Texture coordinates for one image of a sample: the rectangle of the frame
/// being blended from (`*_0`) and the frame being blended to (`*_1`)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceSampleTextureCoords {
    pub left_u0: f32,
    pub top_v0: f32,
    pub right_u0: f32,
    pub bottom_v0: f32,
    pub left_u1: f32,
    pub top_v1: f32,
    pub right_u1: f32,
    pub bottom_v1: f32,
}

impl SequenceSampleTextureCoords {
    /// Pair the rectangles of two authored frames
    pub fn from_frames(from: FrameRect, to: FrameRect) -> Self {
        Self {
            left_u0: from.left,
            top_v0: from.top,
            right_u0: from.right,
            bottom_v0: from.bottom,
            left_u1: to.left,
            top_v1: to.top,
            right_u1: to.right,
            bottom_v1: to.bottom,
        }
    }

    /// Rectangle of the frame being blended from
    pub fn current(&self) -> FrameRect {
        FrameRect::new(self.left_u0, self.top_v0, self.right_u0, self.bottom_v0)
    }

    /// Rectangle of the frame being blended to
    pub fn next(&self) -> FrameRect {
        FrameRect::new(self.left_u1, self.top_v1, self.right_u1, self.bottom_v1)
    }
}

/// One entry of a sequence's sample table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetSequenceSample {
    /// Coordinates for image 0 and image 1
    pub texture_coords: [SequenceSampleTextureCoords; MAX_IMAGES_PER_FRAME_IN_MEMORY],
    /// Blend weight of the `*_1` rectangles
    pub blend_factor: f32,
}

impl SheetSequenceSample {
    /// Full-texture sample used when no sheet data is available
    pub const UNIT: Self = Self {
        texture_coords: [
            SequenceSampleTextureCoords {
                left_u0: 0.0,
                top_v0: 0.0,
                right_u0: 1.0,
                bottom_v0: 1.0,
                left_u1: 0.0,
                top_v1: 0.0,
                right_u1: 1.0,
                bottom_v1: 1.0,
            };
            MAX_IMAGES_PER_FRAME_IN_MEMORY
        ],
        blend_factor: 1.0,
    };

    /// Coordinates of the first image
    pub fn primary(&self) -> &SequenceSampleTextureCoords {
        &self.texture_coords[0]
    }
}

impl Default for SheetSequenceSample {
    fn default() -> Self {
        Self::UNIT
    }
}
