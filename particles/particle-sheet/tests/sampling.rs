//! Run-time sampling behaviour of loaded sheets

mod common;

use common::{even_sequence, init_logging, sheet_bytes};
use particle_sheet::{SEQUENCE_SAMPLE_COUNT, SequenceFlags, SheetLoader};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use test_case::test_case;

#[test_case(0.0, 512.0 ; "zero age")]
#[test_case(0.37, 512.0 ; "fractional age")]
#[test_case(1.0e6, 1.0 ; "huge age")]
#[test_case(2.5, 0.0 ; "zero scale")]
fn test_single_frame_sequence_ignores_age(age: f32, age_scale: f32) {
    let data = sheet_bytes(vec![even_sequence(0, SequenceFlags::empty(), 1)]);
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();
    let reference = *sheet.sample(0.0, 1.0, 0);
    assert_eq!(*sheet.sample(age, age_scale, 0), reference);
}

#[test_case(512.0 ; "one cycle per second")]
#[test_case(64.0 ; "eight seconds per cycle")]
#[test_case(1.0 ; "unit scale")]
fn test_clamped_sequence_holds_boundary_sample(age_scale: f32) {
    let data = sheet_bytes(vec![even_sequence(0, SequenceFlags::CLAMP, 3)]);
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();

    let boundary = *sheet.sample(511.0 / age_scale, age_scale, 0);
    for age in [1.0e3, 1.0e5, 1.0e7] {
        assert_eq!(*sheet.sample(age, age_scale, 0), boundary);
    }
}

#[test]
fn test_looping_sequence_repeats_after_one_cycle() {
    let data = sheet_bytes(vec![even_sequence(0, SequenceFlags::empty(), 4)]);
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();

    for step in [0u32, 17, 255, 400, 511] {
        let age = step as f32 / 512.0;
        assert_eq!(*sheet.sample(age + 1.0, 512.0, 0), *sheet.sample(age, 512.0, 0));
        assert_eq!(*sheet.sample(age + 3.0, 512.0, 0), *sheet.sample(age, 512.0, 0));
    }
}

#[test]
fn test_multi_frame_samples_walk_through_frames() {
    let data = sheet_bytes(vec![even_sequence(0, SequenceFlags::CLAMP, 4)]);
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();

    // four quarter-second frames put knots at samples 0, 128, 256 and 384
    let start = sheet.sample(0.0, 1.0, 0);
    assert_eq!(start.primary().left_u0, 0.0);
    assert_eq!(start.primary().left_u1, 0.0);
    assert_eq!(start.blend_factor, 1.0);

    let between = sheet.sample(64.0, 1.0, 0);
    assert_eq!(between.primary().left_u0, 0.0);
    assert_eq!(between.primary().left_u1, 0.25);
    assert!((between.blend_factor - 0.5).abs() < 1e-5);

    let later = sheet.sample(192.0, 1.0, 0);
    assert_eq!(later.primary().left_u0, 0.25);
    assert_eq!(later.primary().left_u1, 0.5);

    // past the last knot a clamped sequence holds the final frame
    let end = sheet.sample(500.0, 1.0, 0);
    assert_eq!(end.primary().left_u0, 0.75);
    assert_eq!(end.primary().left_u1, 0.75);
}

#[test]
fn test_backfilled_sequence_shares_samples() {
    init_logging();
    let data = sheet_bytes(vec![
        even_sequence(0, SequenceFlags::CLAMP, 3),
        even_sequence(1, SequenceFlags::empty(), 0),
    ]);
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();

    assert_eq!(sheet.sequence_count(), 1);

    let original = sheet.sequence(0).unwrap();
    let copy = sheet.sequence(1).unwrap();
    assert!(!original.is_copy);
    assert!(copy.is_copy);
    assert_eq!(copy.flags, SequenceFlags::CLAMP);
    assert_eq!(copy.frame_count, 3);

    let (Some(a), Some(b)) = (&original.samples, &copy.samples) else {
        panic!("both slots should carry samples");
    };
    assert_eq!(a.len(), SEQUENCE_SAMPLE_COUNT);
    assert_eq!(a[..], b[..]);
    assert!(std::sync::Arc::ptr_eq(a, b));
}

#[test]
fn test_empty_sheet_returns_fallback() {
    let data = sheet_bytes(Vec::new());
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();
    assert_eq!(sheet.sequence_count(), 0);
    assert_eq!(sheet.sample(0.5, 512.0, 0), sheet.fallback_sample());
}

proptest! {
    #[test]
    fn prop_sample_index_stays_in_table(age in 0.0f32..1.0e6, scale in 0.0f32..4096.0, clamp: bool) {
        let flags = if clamp { SequenceFlags::CLAMP } else { SequenceFlags::empty() };
        let data = sheet_bytes(vec![even_sequence(0, flags, 5)]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        let seq = sheet.sequence(0).unwrap();
        prop_assert!(seq.sample_index(age * scale) < SEQUENCE_SAMPLE_COUNT);
    }

    #[test]
    fn prop_blend_factor_is_unit_interval(frames in 2usize..12, step in 0usize..512) {
        let data = sheet_bytes(vec![even_sequence(0, SequenceFlags::empty(), frames)]);
        let sheet = SheetLoader::new().load_bytes(&data).unwrap();
        let sample = sheet.sample(step as f32, 1.0, 0);
        prop_assert!((0.0..=1.0).contains(&sample.blend_factor));
    }
}
