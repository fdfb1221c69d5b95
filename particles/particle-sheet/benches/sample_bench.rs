use criterion::{Criterion, criterion_group, criterion_main};
use particle_sheet::{
    FrameDescription, FrameRect, SequenceDescription, SequenceFlags, SheetDescription, SheetLoader,
};
use std::hint::black_box;

fn create_test_sheet() -> Vec<u8> {
    let mut sheet = SheetDescription::new(1);
    for index in 0..8 {
        let mut sequence = SequenceDescription::new(index, SequenceFlags::empty());
        for frame in 0..16 {
            let left = frame as f32 / 16.0;
            sequence = sequence.with_frame(FrameDescription::new(
                1.0 / 16.0,
                FrameRect::new(left, 0.0, left + 1.0 / 16.0, 1.0),
            ));
        }
        sheet = sheet.with_sequence(sequence);
    }
    sheet.to_bytes().unwrap()
}

fn bench_sheet_load(c: &mut Criterion) {
    let data = create_test_sheet();
    let loader = SheetLoader::new();

    c.bench_function("load_sheet", |b| {
        b.iter(|| loader.load_bytes(black_box(&data)).unwrap())
    });
}

fn bench_sheet_sample(c: &mut Criterion) {
    let sheet = SheetLoader::new().load_bytes(&create_test_sheet()).unwrap();

    c.bench_function("sample_1000_particles", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for particle in 0..1000 {
                let age = particle as f32 * 0.013;
                acc += sheet.sample(black_box(age), 512.0, particle % 8).blend_factor;
            }
            acc
        })
    });
}

criterion_group!(benches, bench_sheet_load, bench_sheet_sample);
criterion_main!(benches);
