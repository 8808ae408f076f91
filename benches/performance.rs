//! Performance benchmarks for the event router.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use canopy::{
    EventData, EventDefinition, EventEnvelope, EventListener, PathAlgebra, Router, RouterConfig,
    SegmentCache,
};
use std::sync::Arc;

struct Sink;

impl EventListener for Sink {
    fn on_event(&self, _event: &EventEnvelope) {}
}

fn deep_path(depth: usize) -> String {
    (0..depth)
        .map(|level| format!("s{}", level))
        .collect::<Vec<_>>()
        .join(".")
}

/// Benchmark mask matching with varying path depths
fn bench_path_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_matching");

    for depth in [2, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let algebra = PathAlgebra::default();
            let path = deep_path(depth);

            // Wildcard in the middle of the mask
            let mut segments: Vec<String> =
                path.split('.').map(|segment| segment.to_string()).collect();
            segments[depth / 2] = "*".to_string();
            let mask = segments.join(".");

            b.iter(|| {
                black_box(algebra.matches(&mask, &path, false, false));
            });
        });
    }

    group.finish();
}

/// Benchmark segment splitting through the shared cache
fn bench_segment_cache(c: &mut Criterion) {
    let algebra = PathAlgebra::default();
    let hot = deep_path(8);

    // Warm the cache with the hot path
    algebra.matches(&hot, &hot, false, false);

    c.bench_function("split_cached", |b| {
        b.iter(|| {
            black_box(algebra.split(&hot));
        });
    });

    let cold_algebra = PathAlgebra::new(Arc::new(SegmentCache::new(64)));
    let mut serial = 0u64;
    c.bench_function("split_evicting", |b| {
        b.iter(|| {
            serial += 1;
            let path = format!("cold.{}.path", serial);
            black_box(cold_algebra.split(&path));
        });
    });
}

/// Benchmark mask expansion over growing namespaces
fn bench_mask_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_expansion");

    for children in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("children", children),
            &children,
            |b, &count| {
                let router = Router::new(RouterConfig::default());
                router.add_context("zone", "area").unwrap();
                for child in 0..count {
                    let path = format!("zone.device{}", child);
                    router.add_context(&path, "device").unwrap();
                }

                b.iter(|| {
                    black_box(router.expand("zone.*"));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the no-listener short circuit on a started router
fn bench_dispatch_short_circuit(c: &mut Criterion) {
    let router = Router::new(RouterConfig::default());
    router.add_context("quiet", "device").unwrap();
    router
        .declare_event("quiet", EventDefinition::new("tick"))
        .unwrap();
    router.start().unwrap();

    c.bench_function("fire_no_listeners", |b| {
        b.iter(|| {
            black_box(router.fire("quiet", "tick", EventData::empty()).unwrap());
        });
    });

    router.stop();
}

/// Benchmark inline synchronous delivery to one listener
fn bench_synchronous_delivery(c: &mut Criterion) {
    let router = Router::new(RouterConfig {
        synchronous: true,
        ..RouterConfig::default()
    });
    router.add_context("line", "device").unwrap();
    router
        .declare_event("line", EventDefinition::new("pulse"))
        .unwrap();
    router.subscribe("line", "pulse", Arc::new(Sink));

    c.bench_function("fire_synchronous", |b| {
        b.iter(|| {
            black_box(router.fire("line", "pulse", EventData::empty()).unwrap());
        });
    });
}

/// Benchmark subscribing and unsubscribing against a populated namespace
fn bench_subscription_churn(c: &mut Criterion) {
    let router = Router::new(RouterConfig::default());
    router.add_context("fleet", "area").unwrap();
    for unit in 0..100 {
        let path = format!("fleet.unit{}", unit);
        router.add_context(&path, "device").unwrap();
        router
            .declare_event(&path, EventDefinition::new("seen"))
            .unwrap();
    }

    c.bench_function("subscribe_unsubscribe_mask_100", |b| {
        b.iter(|| {
            let listener: Arc<dyn EventListener> = Arc::new(Sink);
            let id = canopy::listener_id(&listener);
            router.subscribe("fleet.*", "seen", listener);
            router.unsubscribe("fleet.*", "seen", id);
        });
    });
}

criterion_group!(
    benches,
    bench_path_matching,
    bench_segment_cache,
    bench_mask_expansion,
    bench_dispatch_short_circuit,
    bench_synchronous_delivery,
    bench_subscription_churn,
);

criterion_main!(benches);
