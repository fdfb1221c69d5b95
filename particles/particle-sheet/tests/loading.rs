//! Loading sheets from files and malformed buffers

mod common;

use common::{even_sequence, init_logging, sheet_bytes};
use particle_sheet::{SequenceFlags, SheetError, SheetLoader, SheetRegistry};
use std::fs;
use std::sync::Arc;

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("smoke.sht");
    fs::write(
        &path,
        sheet_bytes(vec![
            even_sequence(0, SequenceFlags::empty(), 4),
            even_sequence(1, SequenceFlags::CLAMP | SequenceFlags::NO_ALPHA, 2),
        ]),
    )
    .unwrap();

    let sheet = SheetLoader::new().load_file(&path).unwrap();
    assert_eq!(sheet.sequence_count(), 2);
    assert_eq!(
        sheet.sequence_flags(1),
        SequenceFlags::CLAMP | SequenceFlags::NO_ALPHA
    );
    assert!((sheet.frame_span(0) - 1.0).abs() < 1e-6);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SheetLoader::new().load_file(dir.path().join("absent.sht"));
    assert!(matches!(result, Err(SheetError::Io(_))));
}

#[test]
fn test_negative_sequence_count_is_rejected() {
    let mut data = Vec::new();
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&(-3i32).to_le_bytes());
    let result = SheetLoader::new().load_bytes(&data);
    assert!(matches!(result, Err(SheetError::InvalidSequenceCount(-3))));
}

#[test]
fn test_truncated_entry_keeps_parsed_sequences() {
    init_logging();
    let mut data = sheet_bytes(vec![
        even_sequence(0, SequenceFlags::empty(), 2),
        even_sequence(1, SequenceFlags::empty(), 2),
    ]);
    data.truncate(data.len() - 10);

    let sheet = SheetLoader::new().load_bytes(&data).unwrap();
    assert_eq!(sheet.sequence_count(), 1);
    assert!(sheet.sequence(1).unwrap().is_copy);

    let strict = SheetLoader::new().strict(true).load_bytes(&data);
    assert!(matches!(strict, Err(SheetError::Truncated { .. })));
}

#[test]
fn test_zero_total_time_does_not_produce_nan() {
    let data = sheet_bytes(vec![
        even_sequence(0, SequenceFlags::empty(), 3).with_total_time(0.0),
    ]);
    let sheet = SheetLoader::new().load_bytes(&data).unwrap();
    for step in 0..512 {
        assert!(sheet.sample(step as f32, 1.0, 0).blend_factor.is_finite());
    }
}

#[test]
fn test_registry_shares_loaded_sheet() {
    let data = sheet_bytes(vec![even_sequence(0, SequenceFlags::empty(), 2)]);
    let registry = SheetRegistry::new();
    let loader = SheetLoader::new();

    let a = registry
        .get_or_load_with("sparks", || loader.load_bytes(&data))
        .unwrap();
    let b = registry
        .get_or_load_with("sparks", || loader.load_bytes(&[]))
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    drop((a, b));
    assert!(registry.get("sparks").is_none());
}
