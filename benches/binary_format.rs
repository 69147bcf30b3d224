use chrono::NaiveDateTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;
use wiff::config::DATE_FMT;
use wiff::storage::{ChunkHeader, ChunkTag};
use wiff::{ChannelConfig, ChannelSet, Compression, Recording, RecordingConfig};

fn bench_config() -> RecordingConfig {
    let ts = NaiveDateTime::parse_from_str("20200101 000000.000000", DATE_FMT).unwrap();
    RecordingConfig {
        start: ts,
        end: ts,
        description: "bench".to_string(),
        fs: 1000,
        channels: (0..12)
            .map(|i| ChannelConfig::new(&format!("lead{i}"), 16, "uV"))
            .collect(),
    }
}

fn all_channels() -> ChannelSet {
    (0..12u8).collect()
}

fn bench_append_frames(c: &mut Criterion) {
    let frames: Vec<Vec<u64>> = (0..1000u64).map(|i| vec![i % 4096; 12]).collect();

    c.bench_function("append_10k_frames", |b| {
        b.iter(|| {
            let dir = TempDir::new().unwrap();
            let mut rec = Recording::create(&dir.path().join("b.wiff"), &bench_config()).unwrap();
            rec.new_segment(&all_channels(), Compression::None, None).unwrap();

            for _ in 0..10 {
                rec.add_frame_values(black_box(&frames)).unwrap();
            }

            rec.close().unwrap();
        });
    });
}

fn bench_get_frame(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("read.wiff");

    // Setup: 10 segments of 1000 frames
    {
        let mut rec = Recording::create(&path, &bench_config()).unwrap();
        let frames: Vec<Vec<u64>> = (0..1000u64).map(|i| vec![i; 12]).collect();
        for _ in 0..10 {
            rec.new_segment(&all_channels(), Compression::None, None).unwrap();
            rec.add_frame_values(&frames).unwrap();
        }
        rec.close().unwrap();
    }

    let rec = Recording::open(&path).unwrap();

    c.bench_function("get_frame", |b| {
        b.iter(|| rec.get_frame(black_box(7_321)).unwrap());
    });

    c.bench_function("iterate_10k_frames", |b| {
        b.iter(|| {
            rec.frames(0..10_000)
                .unwrap()
                .map(|f| f.unwrap().samples[0].1)
                .sum::<u64>()
        });
    });
}

fn bench_header_roundtrip(c: &mut Criterion) {
    let header = ChunkHeader::new(ChunkTag::Wave, 8192, *b"0\0\0\0\x01\0\0\0");

    c.bench_function("chunk_header_roundtrip", |b| {
        b.iter(|| {
            let bytes = black_box(&header).to_bytes();
            ChunkHeader::from_bytes(black_box(&bytes))
        });
    });
}

criterion_group!(
    benches,
    bench_append_frames,
    bench_get_frame,
    bench_header_roundtrip
);
criterion_main!(benches);
