//! Writing sheet buffers
//!
//! Produces the same layout [`SheetLoader`](crate::SheetLoader) reads. Used by
//! tools that author sheets and by tests that need fixture data.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::error::Result;
use crate::sample::{FrameRect, MAX_IMAGES_PER_FRAME_ON_DISK, SequenceFlags};

/// One authored frame
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameDescription {
    /// Frame duration in seconds
    pub duration: f32,
    /// Image rectangles, the first one is required
    pub images: Vec<FrameRect>,
}

impl FrameDescription {
    /// Frame showing a single rectangle
    pub fn new(duration: f32, rect: FrameRect) -> Self {
        Self {
            duration,
            images: vec![rect],
        }
    }
}

/// One authored sequence
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceDescription {
    /// Slot index written to the file
    pub index: i32,
    /// Sequence flags
    pub flags: SequenceFlags,
    /// Total time written to the file; `None` uses the sum of durations
    pub total_time: Option<f32>,
    /// Frames in order
    pub frames: Vec<FrameDescription>,
}

impl SequenceDescription {
    /// Empty sequence for the given slot
    pub fn new(index: i32, flags: SequenceFlags) -> Self {
        Self {
            index,
            flags,
            total_time: None,
            frames: Vec::new(),
        }
    }

    /// Append a frame
    pub fn with_frame(mut self, frame: FrameDescription) -> Self {
        self.frames.push(frame);
        self
    }

    /// Override the total time field
    pub fn with_total_time(mut self, total_time: f32) -> Self {
        self.total_time = Some(total_time);
        self
    }
}

/// A sheet ready to be written
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetDescription {
    /// 0 writes one image per frame, anything else writes four
    pub version: i32,
    /// Sequences in file order
    pub sequences: Vec<SequenceDescription>,
}

impl SheetDescription {
    /// Empty sheet of the given version
    pub fn new(version: i32) -> Self {
        Self {
            version,
            sequences: Vec::new(),
        }
    }

    /// Append a sequence
    pub fn with_sequence(mut self, sequence: SequenceDescription) -> Self {
        self.sequences.push(sequence);
        self
    }

    /// Serialize into a writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let images_per_frame = if self.version == 0 {
            1
        } else {
            MAX_IMAGES_PER_FRAME_ON_DISK
        };

        writer.write_i32::<LittleEndian>(self.version)?;
        writer.write_i32::<LittleEndian>(self.sequences.len() as i32)?;

        for sequence in &self.sequences {
            let total = sequence
                .total_time
                .unwrap_or_else(|| sequence.frames.iter().map(|f| f.duration).sum());

            writer.write_i32::<LittleEndian>(sequence.index)?;
            writer.write_i32::<LittleEndian>(i32::from(sequence.flags.bits()))?;
            writer.write_i32::<LittleEndian>(sequence.frames.len() as i32)?;
            writer.write_f32::<LittleEndian>(total)?;

            for frame in &sequence.frames {
                writer.write_f32::<LittleEndian>(frame.duration)?;
                for image in 0..images_per_frame {
                    // missing images repeat the first one
                    let rect = frame
                        .images
                        .get(image)
                        .or_else(|| frame.images.first())
                        .copied()
                        .unwrap_or(FrameRect::UNIT);
                    writer.write_f32::<LittleEndian>(rect.left)?;
                    writer.write_f32::<LittleEndian>(rect.top)?;
                    writer.write_f32::<LittleEndian>(rect.right)?;
                    writer.write_f32::<LittleEndian>(rect.bottom)?;
                }
            }
        }
        Ok(())
    }

    /// Serialize into a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.write(&mut data)?;
        Ok(data)
    }
}
