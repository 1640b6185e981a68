//! Performance benchmarks for dispatch_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::contract::QueryRequest;
use dispatch_core::matching::DispatchEngine;
use dispatch_core::point::Point;
use dispatch_core::routing::RoadNetwork;
use dispatch_core::spatial::{IndexConfig, SpatialIndex};
use dispatch_core::test_helpers::{random_points, TEST_SEED};
use dispatch_core::{DispatchConfig, Dispatcher};

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn bench_k_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("k_nearest");
    for size in SIZES {
        let fleet = random_points(size, 1_000.0, TEST_SEED);
        let index = SpatialIndex::from_points(&fleet, IndexConfig::default());
        let queries = random_points(64, 1_000.0, TEST_SEED + 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |b, index| {
            b.iter(|| {
                for q in &queries {
                    black_box(index.k_nearest(*q, 10));
                }
            });
        });
    }
    group.finish();
}

fn bench_relocation_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_insert");
    for size in SIZES {
        let fleet = random_points(size, 1_000.0, TEST_SEED);
        group.bench_with_input(BenchmarkId::from_parameter(size), &fleet, |b, fleet| {
            let mut index = SpatialIndex::from_points(fleet, IndexConfig::default());
            let mut current = fleet[0];
            let mut step = 0.0;
            b.iter(|| {
                step += 0.001;
                let next = Point::new(current.x + step, current.y);
                index.delete(current).expect("taxi present");
                index.insert(next);
                current = next;
            });
        });
    }
    group.finish();
}

fn bench_shortest_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("shortest_path");
    for size in [100, 1_000] {
        let points = random_points(size, 1_000.0, TEST_SEED);
        let mut network = RoadNetwork::default();
        network.ensure_connected(&points).expect("connect");
        let (from, to) = (points[0], points[size - 1]);
        group.bench_with_input(BenchmarkId::from_parameter(size), &network, |b, network| {
            // Distinct endpoints per iteration would defeat the route cache; this
            // measures the cached path after the first run.
            b.iter(|| black_box(network.shortest_path(from, to).expect("route")));
        });
    }
    group.finish();
}

fn bench_find_nearest_taxis(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_nearest_taxis");
    for size in SIZES {
        let fleet = random_points(size, 1_000.0, TEST_SEED);
        let index = SpatialIndex::from_points(&fleet, IndexConfig::default());
        let mut network = RoadNetwork::default();
        network.ensure_connected(&fleet).expect("connect");
        let engine = DispatchEngine::default();
        let pickup = Point::new(500.5, 499.5);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                black_box(
                    engine
                        .find_nearest_taxis(&index, &mut network, pickup, 5)
                        .expect("query"),
                )
            });
        });
    }
    group.finish();
}

fn bench_dispatcher_query(c: &mut Criterion) {
    let fleet = random_points(1_000, 1_000.0, TEST_SEED);
    let dispatcher = Dispatcher::with_fleet(DispatchConfig::default(), &fleet).expect("dispatcher");
    c.bench_function("dispatcher_query_1000", |b| {
        b.iter(|| {
            black_box(
                dispatcher
                    .query(QueryRequest {
                        pickup: Point::new(250.5, 750.5),
                        dropoff: Some(Point::new(800.0, 100.0)),
                    })
                    .expect("query"),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_k_nearest,
    bench_relocation_churn,
    bench_shortest_path,
    bench_find_nearest_taxis,
    bench_dispatcher_query
);
criterion_main!(benches);
