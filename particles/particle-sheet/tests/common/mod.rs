//! Shared sheet fixtures

#![allow(dead_code)]

use particle_sheet::{
    FrameDescription, FrameRect, SequenceDescription, SequenceFlags, SheetDescription,
};

/// A frame whose left edge encodes its position in the sequence
pub fn numbered_frame(index: usize, duration: f32) -> FrameDescription {
    let left = index as f32 * 0.25;
    FrameDescription::new(duration, FrameRect::new(left, 0.0, left + 0.25, 1.0))
}

/// Sequence of `frames` equally long frames totalling one second
pub fn even_sequence(index: i32, flags: SequenceFlags, frames: usize) -> SequenceDescription {
    let duration = 1.0 / frames as f32;
    (0..frames).fold(SequenceDescription::new(index, flags), |seq, frame| {
        seq.with_frame(numbered_frame(frame, duration))
    })
}

/// Legacy sheet holding the given sequences
pub fn sheet_bytes(sequences: Vec<SequenceDescription>) -> Vec<u8> {
    sequences
        .into_iter()
        .fold(SheetDescription::new(0), SheetDescription::with_sequence)
        .to_bytes()
        .expect("Failed to serialize sheet")
}

/// Enable log output for a test run
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
