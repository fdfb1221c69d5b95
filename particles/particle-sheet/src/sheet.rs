//! Loaded sheets and run-time sequence sampling

use custom_debug::Debug;
use particle_utils::debug;
use std::sync::Arc;

use crate::error::{Result, SheetError};
use crate::sample::{SEQUENCE_SAMPLE_COUNT, SequenceFlags, SheetSequenceSample};

/// One sequence slot of a sheet
#[derive(Debug, Clone, Default)]
pub struct SheetSequence {
    /// Loop/clamp and channel flags
    pub flags: SequenceFlags,
    /// Number of authored frames
    pub frame_count: u32,
    /// Authored total sequence time in seconds
    pub total_time: f32,
    /// Sum of the authored frame durations
    pub frame_span: f32,
    /// Pre-interpolated samples: one for single-frame sequences, otherwise
    /// [`SEQUENCE_SAMPLE_COUNT`]. Copies share the array of their source.
    #[debug(with = debug::option_trimmed_collection_fmt)]
    pub samples: Option<Arc<[SheetSequenceSample]>>,
    /// Slot was backfilled from another sequence
    pub is_copy: bool,
}

impl SheetSequence {
    /// Whether the slot carries sample data
    pub fn is_populated(&self) -> bool {
        self.samples.is_some()
    }

    /// Whether sampling past the end holds the last frame
    pub fn is_clamped(&self) -> bool {
        self.flags.contains(SequenceFlags::CLAMP)
    }

    /// Sample table index for an already scaled age
    pub fn sample_index(&self, scaled_age: f32) -> usize {
        if self.frame_count == 1 {
            return 0;
        }
        let frame = scaled_age as u32;
        let last = (SEQUENCE_SAMPLE_COUNT - 1) as u32;
        let index = if self.is_clamped() {
            frame.min(last)
        } else {
            frame & last
        };
        index as usize
    }
}

/// A sprite-sheet: sequence slots with their sample tables.
///
/// Immutable once loaded; share it through `Arc` between every particle
/// collection that renders with the same material.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub(crate) sequences: Vec<SheetSequence>,
    pub(crate) fallback: SheetSequenceSample,
    pub(crate) images_per_frame_on_disk: usize,
}

impl Sheet {
    /// Create a sheet from already built sequence slots
    pub fn from_sequences(
        sequences: Vec<SheetSequence>,
        fallback: SheetSequenceSample,
        images_per_frame_on_disk: usize,
    ) -> Self {
        Self {
            sequences,
            fallback,
            images_per_frame_on_disk,
        }
    }

    /// Number of unique sequences, not counting backfilled copies
    pub fn sequence_count(&self) -> usize {
        self.sequences
            .iter()
            .filter(|seq| seq.is_populated() && !seq.is_copy)
            .count()
    }

    /// Number of sequence slots, including copies and empty slots
    pub fn slot_count(&self) -> usize {
        self.sequences.len()
    }

    /// All sequence slots
    pub fn sequences(&self) -> &[SheetSequence] {
        &self.sequences
    }

    /// A sequence slot by index
    pub fn sequence(&self, sequence: usize) -> Result<&SheetSequence> {
        self.sequences
            .get(sequence)
            .ok_or(SheetError::SequenceOutOfRange {
                sequence,
                count: self.sequences.len(),
            })
    }

    /// Flags of a sequence, empty for unknown slots
    pub fn sequence_flags(&self, sequence: usize) -> SequenceFlags {
        self.sequences
            .get(sequence)
            .map(|seq| seq.flags)
            .unwrap_or_default()
    }

    /// Summed frame durations of a sequence, 0 for unknown slots
    pub fn frame_span(&self, sequence: usize) -> f32 {
        self.sequences.get(sequence).map_or(0.0, |seq| seq.frame_span)
    }

    /// Images per frame stored in the source file
    pub fn images_per_frame_on_disk(&self) -> usize {
        self.images_per_frame_on_disk
    }

    /// Sample returned when a sequence has no data
    pub fn fallback_sample(&self) -> &SheetSequenceSample {
        &self.fallback
    }

    /// Look up the sample for a particle of the given age.
    ///
    /// `age_scale` converts age into sample-table steps (512 per cycle).
    /// Single-frame sequences ignore the age; clamped sequences hold sample
    /// 511 past the end; looping sequences wrap every 512 steps.
    pub fn sample(&self, age: f32, age_scale: f32, sequence: usize) -> &SheetSequenceSample {
        let Some(seq) = self.sequences.get(sequence) else {
            return &self.fallback;
        };
        let Some(samples) = seq.samples.as_deref() else {
            return &self.fallback;
        };
        let index = seq.sample_index(age * age_scale);
        samples.get(index).unwrap_or(&self.fallback)
    }
}

/// Sample lookup tolerating a missing sheet.
///
/// Returns `None` when there is no sheet; callers substitute their own
/// default sample.
pub fn sample_for_sequence(
    sheet: Option<&Sheet>,
    age: f32,
    age_scale: f32,
    sequence: usize,
) -> Option<&SheetSequenceSample> {
    sheet.map(|sheet| sheet.sample(age, age_scale, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{FrameRect, SequenceSampleTextureCoords};

    fn numbered_samples(count: usize) -> Arc<[SheetSequenceSample]> {
        (0..count)
            .map(|i| {
                let rect = FrameRect::new(i as f32, 0.0, 0.0, 0.0);
                SheetSequenceSample {
                    texture_coords: [SequenceSampleTextureCoords::from_frames(rect, rect); 2],
                    blend_factor: 0.0,
                }
            })
            .collect()
    }

    fn sheet_with(flags: SequenceFlags, frame_count: u32) -> Sheet {
        let samples = if frame_count == 1 { 1 } else { SEQUENCE_SAMPLE_COUNT };
        Sheet::from_sequences(
            vec![SheetSequence {
                flags,
                frame_count,
                total_time: 1.0,
                frame_span: 1.0,
                samples: Some(numbered_samples(samples)),
                is_copy: false,
            }],
            SheetSequenceSample::UNIT,
            1,
        )
    }

    fn index_of(sample: &SheetSequenceSample) -> f32 {
        sample.primary().left_u0
    }

    #[test]
    fn test_single_frame_ignores_age() {
        let sheet = sheet_with(SequenceFlags::empty(), 1);
        assert_eq!(index_of(sheet.sample(0.0, 512.0, 0)), 0.0);
        assert_eq!(index_of(sheet.sample(123.4, 9.0, 0)), 0.0);
    }

    #[test]
    fn test_loop_wraps() {
        let sheet = sheet_with(SequenceFlags::empty(), 4);
        assert_eq!(index_of(sheet.sample(10.0, 1.0, 0)), 10.0);
        assert_eq!(index_of(sheet.sample(522.0, 1.0, 0)), 10.0);
    }

    #[test]
    fn test_clamp_holds_last_sample() {
        let sheet = sheet_with(SequenceFlags::CLAMP, 4);
        assert_eq!(index_of(sheet.sample(5000.0, 1.0, 0)), 511.0);
        assert_eq!(index_of(sheet.sample(12.0, 1.0, 0)), 12.0);
    }

    #[test]
    fn test_unknown_sequence_uses_fallback() {
        let sheet = sheet_with(SequenceFlags::empty(), 4);
        assert_eq!(sheet.sample(0.0, 1.0, 7), &SheetSequenceSample::UNIT);
        assert!(sheet.sequence(7).is_err());
    }

    #[test]
    fn test_missing_sheet_returns_none() {
        assert!(sample_for_sequence(None, 1.0, 1.0, 0).is_none());
    }
}
