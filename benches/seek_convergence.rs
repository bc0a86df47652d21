//! Benchmarks for seek convergence
//!
//! Measures convergence cost against synthetic sources with different
//! keyframe spacing, plus plain sequential decoding for reference.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediareader::{ReaderState, Step, SyntheticLibrary, SyntheticSource, SyntheticVideo};

const PATH: &str = "/bench/clip.mkv";

fn reader_with_gop(gop: u32) -> ReaderState<SyntheticLibrary> {
    let mut source = SyntheticSource::clip(60, 30).without_audio();
    source.video = Some(SyntheticVideo {
        frame_count: 60 * 30,
        gop,
        time_base: mediareader::Rational::new(1, 15360),
        ..SyntheticVideo::default()
    });
    let mut reader = ReaderState::new(SyntheticLibrary::new().with_source(PATH, source));
    reader.open(PATH).expect("synthetic source should open");
    reader
}

fn bench_track_to_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("track_to_frame");

    for gop in [1u32, 12, 30, 250] {
        let mut reader = reader_with_gop(gop);
        let interval = reader.video_frame_interval().unwrap_or(512);
        let targets: Vec<i64> = (0..32).map(|i| (i * 53 % 1800) * interval + 7).collect();

        group.throughput(Throughput::Elements(targets.len() as u64));
        group.bench_with_input(BenchmarkId::new("gop", gop), &targets, |b, targets| {
            b.iter(|| {
                for &target in targets {
                    black_box(reader.track_to_frame(black_box(target)).ok());
                }
            })
        });
    }

    group.finish();
}

fn bench_sequential_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");
    group.throughput(Throughput::Elements(300));

    group.bench_function("advance_video/300", |b| {
        let mut reader = reader_with_gop(30);
        b.iter(|| {
            reader.seek_to_start().ok();
            for _ in 0..300 {
                if let Ok(Step::Ready(pts)) = reader.advance_video() {
                    black_box(pts);
                }
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_track_to_frame, bench_sequential_decode);
criterion_main!(benches);
