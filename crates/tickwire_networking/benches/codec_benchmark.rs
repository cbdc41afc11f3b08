//! # Snapshot Codec Benchmark
//!
//! Encode, decode, and frame a world of moving dots at several sizes.
//!
//! Run with: `cargo bench --package tickwire_networking`

// Benchmarks don't need strict docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};

use tickwire_core::{BlueprintRegistry, Component, Entity, World};
use tickwire_networking::codec::{ComponentCodec, SnapshotCodec};
use tickwire_networking::protocol::{encode_frame, read_envelope, Envelope};
use tickwire_networking::FrameError;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    const KEY: &'static str = "position";
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Velocity {
    dx: f32,
    dy: f32,
}

impl Component for Velocity {
    const KEY: &'static str = "velocity";
}

fn codec() -> ComponentCodec {
    let mut blueprints = BlueprintRegistry::new();
    blueprints.register("dot", |_| {});
    ComponentCodec::builder()
        .require::<Position>()
        .visible::<Position>()
        .blueprints(blueprints)
        .build()
}

#[allow(clippy::cast_precision_loss)]
fn world(size: usize) -> World {
    (0..size)
        .map(|i| {
            Entity::new(format!("dot-{i}"), "dot")
                .with(Position { x: i as f32, y: 0.5 })
                .with(Velocity { dx: 1.0, dy: -1.0 })
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("snapshot_encode");
    for size in [10, 100, 1000] {
        let world = world(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &world, |b, world| {
            b.iter(|| black_box(codec.encode(1, world)));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("snapshot_decode");
    for size in [10, 100, 1000] {
        let snapshot = codec.encode(1, &world(size));
        let mut mirror = World::new();
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| codec.decode(black_box(snapshot), &mut mirror));
        });
    }
    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let snapshot = codec().encode(1, &world(100));
    c.bench_function("snapshot_frame_100", |b| {
        b.iter(|| {
            let frame = Envelope::snapshot(black_box(&snapshot))
                .map_err(FrameError::from)
                .and_then(|envelope| encode_frame(&envelope));
            let frame = frame.unwrap_or_default();
            black_box(read_envelope(&mut frame.as_slice()).is_ok())
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_frame);
criterion_main!(benches);
