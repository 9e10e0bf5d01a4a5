// Benchmarks for the pure, deterministic algorithms on the detection
// postprocessing hot path: convex hull, dilation, rotating calipers, and CTC
// greedy decode. These run per detected polygon / per recognized region, so
// their cost scales with page density rather than model latency.
//
// Run with: cargo bench --bench geometry_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use speedreader_common::TensorBuffer;
use speedreader_core::ctc::greedy_decode;
use speedreader_core::geometry::{convex_hull, Point, Polygon, RotatedRectangle};

/// A polygon with `n` vertices arranged on a slightly perturbed circle, so the
/// hull keeps most of the points rather than collapsing to a handful.
fn wobbly_ring(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let theta = i as f64 / n as f64 * std::f64::consts::TAU;
            let wobble = if i % 7 == 0 { 0.85 } else { 1.0 };
            Point::new(
                100.0 + theta.cos() * 50.0 * wobble,
                100.0 + theta.sin() * 50.0 * wobble,
            )
        })
        .collect()
}

fn bench_convex_hull(c: &mut Criterion) {
    let mut group = c.benchmark_group("convex_hull");
    for n in [16usize, 64, 256, 1024] {
        let points = wobbly_ring(n);
        group.bench_with_input(BenchmarkId::new("wobbly_ring", n), &points, |b, points| {
            b.iter(|| black_box(convex_hull(black_box(points))));
        });
    }
    group.finish();
}

fn bench_dilate_and_min_area_rect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_postprocess");
    for n in [16usize, 64, 256] {
        let polygon = Polygon::new(wobbly_ring(n)).expect("wobbly ring has >= 3 points");
        group.bench_with_input(BenchmarkId::new("dilate_1.5x", n), &polygon, |b, polygon| {
            b.iter(|| black_box(polygon.dilate(black_box(1.5))));
        });

        let hull = convex_hull(polygon.points());
        group.bench_with_input(
            BenchmarkId::new("rotating_calipers", n),
            &hull,
            |b, hull| {
                b.iter(|| black_box(RotatedRectangle::min_area_from_convex_hull(black_box(hull))));
            },
        );
    }
    group.finish();
}

/// A `[timesteps, vocab_size]` logit tensor favoring a different class at
/// each timestep, with an occasional blank, so the decode loop does real
/// argmax/collapse work rather than short-circuiting on an all-blank input.
fn synthetic_logits(timesteps: usize, vocab_size: usize) -> TensorBuffer {
    let mut data = vec![0.0f32; timesteps * vocab_size];
    for t in 0..timesteps {
        let winner = if t % 5 == 0 { 0 } else { 1 + (t % (vocab_size - 1)) };
        data[t * vocab_size + winner] = 10.0;
    }
    TensorBuffer::new(data, vec![timesteps, vocab_size]).expect("shape matches data length")
}

fn bench_ctc_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctc_greedy_decode");
    let dictionary: Vec<String> = (0..128).map(|i| char::from(32 + i as u8).to_string()).collect();
    for timesteps in [25usize, 100, 400] {
        let logits = synthetic_logits(timesteps, dictionary.len() + 1);
        group.bench_with_input(
            BenchmarkId::new("timesteps", timesteps),
            &logits,
            |b, logits| {
                b.iter(|| black_box(greedy_decode(black_box(logits), black_box(&dictionary))));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_convex_hull,
    bench_dilate_and_min_area_rect,
    bench_ctc_decode
);
criterion_main!(benches);
