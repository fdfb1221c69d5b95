//! Sprite-sheet sequence files for particle rendering.
//!
//! A sheet describes animated sequences of texture rectangles. Loading a
//! sheet pre-interpolates every multi-frame sequence into a fixed table of
//! [`SEQUENCE_SAMPLE_COUNT`] samples so a particle's texture coordinates can
//! be looked up from its age with one multiply and a mask.
//!
//! ```rust,ignore
//! use particle_sheet::SheetLoader;
//!
//! let sheet = SheetLoader::new().load_file("smoke.sht")?;
//! let sample = sheet.sample(particle_age, 512.0 / lifetime, 0);
//! ```

pub mod builder;
pub mod error;
pub mod interpolation;
pub mod parser;
pub mod registry;
pub mod sample;
pub mod sheet;

pub use builder::{FrameDescription, SequenceDescription, SheetDescription};
pub use error::{Result, SheetError};
pub use parser::{MIN_SEQUENCE_SLOTS, SheetLoader};
pub use registry::SheetRegistry;
pub use sample::{
    FrameRect, MAX_IMAGES_PER_FRAME_IN_MEMORY, MAX_IMAGES_PER_FRAME_ON_DISK,
    SEQUENCE_SAMPLE_COUNT, SequenceFlags, SequenceSampleTextureCoords, SheetSequenceSample,
};
pub use sheet::{Sheet, SheetSequence, sample_for_sequence};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
