//! Benchmarks for subtitle parsing and text extraction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mediaflow::transform::{extract, extract_with, parse_srt, ExtractOptions, Timecode};

fn lecture_srt(cues: u64) -> String {
    let mut srt = String::new();
    for i in 0..cues {
        let start = Timecode::from_millis(i * 3000);
        let end = Timecode::from_millis(i * 3000 + 2500);
        srt.push_str(&format!(
            "{}\n{start} --> {end}\n<i>Speaker 1:</i> Packet {i} is forwarded\nalong the shortest path. [beep]\n\n",
            i + 1
        ));
    }
    srt
}

fn extract_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for cues in [100u64, 1_000, 10_000] {
        let srt = lecture_srt(cues);
        let entries = parse_srt(&srt).unwrap_or_default();

        group.bench_with_input(BenchmarkId::new("parse_srt", cues), &srt, |b, srt| {
            b.iter(|| parse_srt(black_box(srt)));
        });
        group.bench_with_input(BenchmarkId::new("extract", cues), &entries, |b, entries| {
            b.iter(|| extract(black_box(entries)));
        });

        let options = ExtractOptions::cleaned();
        group.bench_with_input(BenchmarkId::new("extract_cleaned", cues), &entries, |b, entries| {
            b.iter(|| extract_with(black_box(entries), &options));
        });
    }
    group.finish();
}

criterion_group!(benches, extract_benchmark);
criterion_main!(benches);
