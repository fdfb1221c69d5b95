//! Binary sheet reader
//!
//! Layout (little-endian):
//!
//! ```text
//! i32 version            0 = one image per frame, otherwise 4 on disk
//! i32 sequence_count
//! repeat sequence_count:
//!     i32 sequence_index
//!     i32 flags          low byte only
//!     i32 frame_count
//!     f32 total_time
//!     repeat frame_count:
//!         f32 duration
//!         repeat images_per_frame: f32 left, top, right, bottom
//! ```

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, SheetError};
use crate::interpolation::knot_blend;
use crate::sample::{
    FrameRect, MAX_IMAGES_PER_FRAME_IN_MEMORY, MAX_IMAGES_PER_FRAME_ON_DISK,
    SEQUENCE_SAMPLE_COUNT, SequenceFlags, SequenceSampleTextureCoords, SheetSequenceSample,
};
use crate::sheet::{Sheet, SheetSequence};

/// Minimum number of sequence slots allocated for any sheet
pub const MIN_SEQUENCE_SLOTS: usize = 64;

/// Reads sheet buffers into [`Sheet`]s.
///
/// In the default lenient mode malformed content is logged and parsing stops,
/// keeping every sequence read so far. Strict mode turns the same conditions
/// into errors.
#[derive(Debug, Clone)]
pub struct SheetLoader {
    fallback: SheetSequenceSample,
    strict: bool,
}

impl Default for SheetLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the read position so truncation errors can report it
struct SheetReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> SheetReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    fn map_eof(&self, err: io::Error, needed: usize) -> SheetError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            SheetError::Truncated {
                offset: self.offset,
                needed,
            }
        } else {
            SheetError::Io(err)
        }
    }

    fn read_i32(&mut self) -> Result<i32> {
        let value = self
            .inner
            .read_i32::<LittleEndian>()
            .map_err(|e| self.map_eof(e, 4))?;
        self.offset += 4;
        Ok(value)
    }

    fn read_f32(&mut self) -> Result<f32> {
        let value = self
            .inner
            .read_f32::<LittleEndian>()
            .map_err(|e| self.map_eof(e, 4))?;
        self.offset += 4;
        Ok(value)
    }

    fn read_rect(&mut self) -> Result<FrameRect> {
        Ok(FrameRect {
            left: self.read_f32()?,
            top: self.read_f32()?,
            right: self.read_f32()?,
            bottom: self.read_f32()?,
        })
    }
}

/// One authored frame before interpolation
struct AuthoredFrame {
    images: [FrameRect; MAX_IMAGES_PER_FRAME_IN_MEMORY],
}

/// Outcome of reading one sequence entry
enum Entry {
    Parsed,
    Stop,
}

impl SheetLoader {
    /// Lenient loader returning the unit sample for missing sequences
    pub fn new() -> Self {
        Self {
            fallback: SheetSequenceSample::UNIT,
            strict: false,
        }
    }

    /// Use a different sample for missing sequences
    pub fn with_fallback_sample(mut self, sample: SheetSequenceSample) -> Self {
        self.fallback = sample;
        self
    }

    /// Fail on malformed content instead of logging and stopping
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Load a sheet from a file on disk
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Sheet> {
        let file = File::open(path.as_ref())?;
        self.load(&mut BufReader::new(file))
    }

    /// Load a sheet from an in-memory buffer
    pub fn load_bytes(&self, data: &[u8]) -> Result<Sheet> {
        self.load(&mut Cursor::new(data))
    }

    /// Load a sheet from any reader
    pub fn load<R: Read>(&self, reader: &mut R) -> Result<Sheet> {
        let mut reader = SheetReader::new(reader);

        let version = reader.read_i32()?;
        let images_per_frame = if version == 0 {
            1
        } else {
            MAX_IMAGES_PER_FRAME_ON_DISK
        };

        let declared = reader.read_i32()?;
        if declared < 0 {
            return Err(SheetError::InvalidSequenceCount(declared));
        }
        let declared = declared as usize;

        let mut sequences = vec![SheetSequence::default(); declared.max(MIN_SEQUENCE_SLOTS)];

        for _ in 0..declared {
            match self.read_sequence(&mut reader, images_per_frame, &mut sequences) {
                Ok(Entry::Parsed) => {}
                Ok(Entry::Stop) => break,
                Err(err @ SheetError::Truncated { .. }) if !self.strict => {
                    warn!("Sheet data truncated, keeping sequences read so far: {err}");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        backfill_missing(&mut sequences);

        debug!(
            "Loaded sheet version {} with {} sequences in {} slots",
            version,
            sequences
                .iter()
                .filter(|s| s.is_populated() && !s.is_copy)
                .count(),
            sequences.len()
        );

        Ok(Sheet::from_sequences(
            sequences,
            self.fallback,
            images_per_frame,
        ))
    }

    fn read_sequence<R: Read>(
        &self,
        reader: &mut SheetReader<R>,
        images_per_frame: usize,
        sequences: &mut Vec<SheetSequence>,
    ) -> Result<Entry> {
        let raw_index = reader.read_i32()?;
        if raw_index < 0 {
            if self.strict {
                return Err(SheetError::InvalidSequenceIndex(raw_index));
            }
            warn!("Invalid sheet sequence index {raw_index}, ignoring the rest of the sheet");
            return Ok(Entry::Stop);
        }
        let index = raw_index as usize;
        if index >= sequences.len() {
            sequences.resize(index + 1, SheetSequence::default());
        }

        if sequences[index].is_populated() {
            if self.strict {
                return Err(SheetError::DuplicateSequence(index));
            }
            warn!("Sheet sequence {index} is defined more than once, replacing it");
            sequences[index] = SheetSequence::default();
        }

        let flags = SequenceFlags::from_bits_retain((reader.read_i32()? & 0xFF) as u8);
        let frame_count = reader.read_i32()?;
        let total_time = reader.read_f32()?;

        if frame_count < 0 {
            if self.strict {
                return Err(SheetError::InvalidFrameCount {
                    sequence: index,
                    count: frame_count,
                });
            }
            warn!("Sheet sequence {index} has frame count {frame_count}, ignoring the rest of the sheet");
            return Ok(Entry::Stop);
        }

        let frame_count = frame_count as usize;
        let mut frames = Vec::with_capacity(frame_count.min(SEQUENCE_SAMPLE_COUNT));
        let mut knots = Vec::with_capacity(frames.capacity());
        let mut values = Vec::with_capacity(frames.capacity());
        let mut current_time = 0.0_f32;

        for frame in 0..frame_count {
            let duration = reader.read_f32()?;
            let mut images = [FrameRect::default(); MAX_IMAGES_PER_FRAME_IN_MEMORY];
            for image in 0..images_per_frame {
                let rect = reader.read_rect()?;
                if let Some(slot) = images.get_mut(image) {
                    *slot = rect;
                }
            }
            knots.push(SEQUENCE_SAMPLE_COUNT as f32 * knot_fraction(current_time, total_time));
            values.push(frame as f32);
            frames.push(AuthoredFrame { images });
            current_time += duration;
        }

        let sequence = &mut sequences[index];
        sequence.flags = flags;
        sequence.frame_count = frame_count as u32;
        sequence.total_time = total_time;
        sequence.frame_span = current_time;
        sequence.is_copy = false;

        if frames.is_empty() {
            warn!("Sheet sequence {index} has no frames, it will be backfilled");
            return Ok(Entry::Parsed);
        }

        sequence.samples = Some(build_samples(
            &frames,
            &knots,
            &values,
            images_per_frame,
            !flags.contains(SequenceFlags::CLAMP),
        ));
        Ok(Entry::Parsed)
    }
}

/// Position of a frame start inside the sequence, guarded against a zero total
fn knot_fraction(time: f32, total: f32) -> f32 {
    if total > 0.0 { time / total } else { 0.0 }
}

fn build_samples(
    frames: &[AuthoredFrame],
    knots: &[f32],
    values: &[f32],
    images_per_frame: usize,
    wrap: bool,
) -> Arc<[SheetSequenceSample]> {
    let sample_count = if frames.len() == 1 {
        1
    } else {
        SEQUENCE_SAMPLE_COUNT
    };
    let images = images_per_frame.min(MAX_IMAGES_PER_FRAME_IN_MEMORY);

    (0..sample_count)
        .map(|idx| {
            let blend = knot_blend(
                knots,
                values,
                SEQUENCE_SAMPLE_COUNT as f32,
                idx as f32,
                wrap,
            );
            let from = &frames[(blend.value_a as usize).min(frames.len() - 1)];
            let to = &frames[(blend.value_b as usize).min(frames.len() - 1)];

            let mut sample = SheetSequenceSample {
                blend_factor: blend.blend,
                ..SheetSequenceSample::default()
            };
            for image in 0..images {
                sample.texture_coords[image] =
                    SequenceSampleTextureCoords::from_frames(from.images[image], to.images[image]);
            }
            sample
        })
        .collect()
}

/// Fill empty slots with the first populated sequence, marked as copies
fn backfill_missing(sequences: &mut [SheetSequence]) {
    let Some(source) = sequences.iter().find(|s| s.is_populated()).cloned() else {
        return;
    };
    for slot in sequences.iter_mut().filter(|s| !s.is_populated()) {
        *slot = SheetSequence {
            is_copy: true,
            ..source.clone()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn header(version: i32, count: i32) -> Vec<u8> {
        let mut data = Vec::new();
        data.write_i32::<LittleEndian>(version).unwrap();
        data.write_i32::<LittleEndian>(count).unwrap();
        data
    }

    fn push_sequence(data: &mut Vec<u8>, index: i32, flags: i32, durations: &[f32]) {
        data.write_i32::<LittleEndian>(index).unwrap();
        data.write_i32::<LittleEndian>(flags).unwrap();
        data.write_i32::<LittleEndian>(durations.len() as i32).unwrap();
        data.write_f32::<LittleEndian>(durations.iter().sum()).unwrap();
        for (frame, duration) in durations.iter().enumerate() {
            data.write_f32::<LittleEndian>(*duration).unwrap();
            for value in [frame as f32, 0.0, frame as f32 + 1.0, 1.0] {
                data.write_f32::<LittleEndian>(value).unwrap();
            }
        }
    }

    #[test]
    fn test_minimum_slot_count() {
        let mut data = header(0, 1);
        push_sequence(&mut data, 0, 0, &[1.0]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        assert_eq!(sheet.slot_count(), MIN_SEQUENCE_SLOTS);
        assert_eq!(sheet.sequence_count(), 1);
    }

    #[test]
    fn test_large_index_grows_slots() {
        let mut data = header(0, 1);
        push_sequence(&mut data, 70, 0, &[0.5, 0.5]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        assert_eq!(sheet.slot_count(), 71);
        assert!(!sheet.sequence(70).unwrap().is_copy);
        assert!(sheet.sequence(0).unwrap().is_copy);
    }

    #[test]
    fn test_negative_index_keeps_earlier_sequences() {
        let mut data = header(0, 3);
        push_sequence(&mut data, 0, 0, &[1.0]);
        push_sequence(&mut data, -1, 0, &[1.0]);
        push_sequence(&mut data, 1, 0, &[1.0]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        assert_eq!(sheet.sequence_count(), 1);

        let strict = SheetLoader::new().strict(true).load_bytes(&data);
        assert!(matches!(strict, Err(SheetError::InvalidSequenceIndex(-1))));
    }

    #[test]
    fn test_duplicate_sequence_replaces_earlier() {
        let mut data = header(0, 2);
        push_sequence(&mut data, 0, 0, &[1.0]);
        push_sequence(&mut data, 0, 0, &[0.5, 0.5, 0.5]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        assert_eq!(sheet.sequence(0).unwrap().frame_count, 3);
    }

    #[test]
    fn test_truncated_header_is_error() {
        let data = vec![0u8; 6];
        let result = SheetLoader::new().load_bytes(&data);
        assert!(matches!(result, Err(SheetError::Truncated { offset: 4, .. })));
    }

    #[test]
    fn test_versioned_sheet_keeps_two_images() {
        let mut data = header(1, 1);
        data.write_i32::<LittleEndian>(0).unwrap();
        data.write_i32::<LittleEndian>(0).unwrap();
        data.write_i32::<LittleEndian>(1).unwrap();
        data.write_f32::<LittleEndian>(1.0).unwrap();
        data.write_f32::<LittleEndian>(1.0).unwrap();
        for image in 0..4 {
            for _ in 0..4 {
                data.write_f32::<LittleEndian>(image as f32).unwrap();
            }
        }
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        let sample = sheet.sample(0.0, 1.0, 0);
        assert_eq!(sample.texture_coords[0].left_u0, 0.0);
        assert_eq!(sample.texture_coords[1].left_u0, 1.0);
        assert_eq!(sheet.images_per_frame_on_disk(), 4);
    }

    #[test]
    fn test_flags_keep_low_byte() {
        let mut data = header(0, 1);
        push_sequence(&mut data, 0, 0x1_01, &[1.0, 1.0]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        assert_eq!(sheet.sequence_flags(0), SequenceFlags::CLAMP);
    }
}
