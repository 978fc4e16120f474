//! 덤프 코덱 벤치마크
//!
//! 레코드 인코딩/디코딩 처리량을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use kotekan_runner_core::dump::{decode_records, encode_record};
use kotekan_runner_core::generator::{FakeVisGenerator, FakeVisMode, FakeVisParams};

fn frames(num_elements: u32, count: u64) -> Vec<kotekan_runner_core::VisFrame> {
    FakeVisGenerator::new(FakeVisParams {
        num_elements,
        num_frames: count,
        mode: FakeVisMode::Gaussian,
        ..FakeVisParams::default()
    })
    .collect()
}

fn bench_encode(c: &mut Criterion) {
    let frames = frames(64, 16);
    let bytes: u64 = frames
        .iter()
        .map(|f| encode_record(f).map(|r| r.len() as u64).unwrap_or(0))
        .sum();

    let mut group = c.benchmark_group("dump_encode");
    group.throughput(Throughput::Bytes(bytes));
    group.bench_function("64_elements_16_frames", |b| {
        b.iter(|| {
            for frame in &frames {
                black_box(encode_record(black_box(frame)).ok());
            }
        })
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut buf = Vec::new();
    for frame in frames(64, 16) {
        if let Ok(record) = encode_record(&frame) {
            buf.extend_from_slice(&record);
        }
    }

    let mut group = c.benchmark_group("dump_decode");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("64_elements_16_frames", |b| {
        b.iter(|| black_box(decode_records(black_box(&buf)).ok()))
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
