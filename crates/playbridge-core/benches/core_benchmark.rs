//! Benchmark tests for playbridge-core operations
//!
//! Run with: cargo bench -p playbridge-core

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use playbridge_core::format::{infer_format, resolve_format};
use playbridge_core::mock::CollectingListener;
use playbridge_core::telemetry;
use playbridge_core::{PlayerEvent, QueuingEventSink};

// ============================================================================
// Helpers
// ============================================================================

fn telemetry_headers(extra: usize) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = [
        ("enableMuxAnalytics", "true"),
        ("muxEnvKey", "env123"),
        ("videoTitle", "Movie"),
        ("cvd_video_id", "abc"),
        ("vdu", "5400000"),
        ("sessionID", "sess1"),
        ("c1", "user42"),
        ("customData3", "cohort-b"),
        ("User-Agent", "Playbridge/1.0"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for i in 0..extra {
        headers.insert(format!("X-Header-{i}"), format!("value-{i}"));
    }
    headers
}

// ============================================================================
// Sink Benchmarks
// ============================================================================

fn bench_sink_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sink Drain");

    for &count in &[10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("queue_then_attach", count), &count, |b, &count| {
            b.iter(|| {
                let sink = QueuingEventSink::new();
                for i in 0..count {
                    sink.success(PlayerEvent::buffering_update(i as i64));
                }
                let listener = CollectingListener::new();
                sink.set_delegate(Some(listener.clone()));
                black_box(listener.messages().len())
            });
        });
    }

    group.finish();
}

fn bench_sink_forward(c: &mut Criterion) {
    let sink = QueuingEventSink::new();
    sink.set_delegate(Some(CollectingListener::new()));

    c.bench_function("sink_forward_attached", |b| {
        b.iter(|| sink.success(black_box(PlayerEvent::BufferingStart)));
    });
}

// ============================================================================
// Resolver Benchmarks
// ============================================================================

fn bench_format_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("Format Resolution");

    group.bench_function("infer_hls", |b| {
        b.iter(|| infer_format(black_box("https://cdn.example.com/live/master.m3u8?token=abc")))
    });
    group.bench_function("infer_smooth_streaming", |b| {
        b.iter(|| infer_format(black_box("https://cdn.example.com/vod/movie.ism/Manifest")))
    });
    group.bench_function("hint_dash", |b| {
        b.iter(|| resolve_format(black_box("https://cdn.example.com/vod"), Some("dash")))
    });

    group.finish();
}

fn bench_telemetry_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("Telemetry Resolution");

    for &extra in &[0, 20, 100] {
        let headers = telemetry_headers(extra);
        group.bench_with_input(BenchmarkId::new("resolve", extra), &headers, |b, headers| {
            b.iter(|| telemetry::resolve(black_box(headers), "https://cdn.example.com/a.m3u8"))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sink_drain,
    bench_sink_forward,
    bench_format_resolution,
    bench_telemetry_resolution,
);
criterion_main!(benches);
