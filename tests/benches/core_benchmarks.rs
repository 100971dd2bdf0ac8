//! # Cadence Core Benchmarks
//!
//! Hot-path costs of the per-event building blocks:
//!
//! | Component | Operation | Expectation |
//! |-----------|-----------|-------------|
//! | Expiring store | set / get | O(log n), sub-microsecond |
//! | Deduplicator | check_and_mark at capacity | batch eviction amortised |
//! | Key serializer | submit + await, many keys | dominated by task spawn |
//! | Work queue | submit + await under cap | dominated by task spawn |

use cadence_core::{
    DedupConfig, Deduplicator, ExpiringStore, KeySerializer, ManualTimeSource, WorkQueue,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Expiring store
// ============================================================================

fn bench_expiring_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("expiring-store");

    for size in [1_000usize, 10_000, 100_000] {
        let clock = Arc::new(ManualTimeSource::new(0));
        let store = ExpiringStore::with_time_source(Duration::from_secs(60), clock);
        let keys: Vec<String> = (0..size).map(|i| format!("session-{i}")).collect();
        for (i, key) in keys.iter().enumerate() {
            store.set(key, i);
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("get_hit", size), &keys, |b, keys| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let key = &keys[rng.gen_range(0..keys.len())];
                black_box(store.get(key))
            })
        });

        group.bench_with_input(BenchmarkId::new("overwrite", size), &keys, |b, keys| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let key = &keys[rng.gen_range(0..keys.len())];
                store.set(key, black_box(0));
            })
        });
    }

    group.finish();
}

// ============================================================================
// Deduplicator
// ============================================================================

fn bench_deduplicator(c: &mut Criterion) {
    let mut group = c.benchmark_group("deduplicator");

    for max_entries in [1_000usize, 10_000] {
        let dedup = Deduplicator::with_time_source(
            &DedupConfig {
                max_entries,
                ..DedupConfig::default()
            },
            Arc::new(ManualTimeSource::new(0)),
        );
        let mut next_id = 0u64;

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("fresh_ids_at_capacity", max_entries), |b| {
            b.iter(|| {
                next_id += 1;
                black_box(dedup.check_and_mark(&format!("event-{next_id}")))
            })
        });

        dedup.mark_seen("hot");
        group.bench_function(BenchmarkId::new("repeat_id", max_entries), |b| {
            b.iter(|| black_box(dedup.check_and_mark("hot")))
        });
    }

    group.finish();
}

// ============================================================================
// Executors
// ============================================================================

fn bench_executors(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("benchmark runtime");

    let mut group = c.benchmark_group("executors");
    group.measurement_time(Duration::from_secs(10));

    for keys in [1usize, 16, 256] {
        let tasks = 1_024;
        group.throughput(Throughput::Elements(tasks as u64));
        group.bench_with_input(
            BenchmarkId::new("serializer_submit", keys),
            &keys,
            |b, &keys| {
                b.to_async(&runtime).iter(|| async move {
                    let serializer = KeySerializer::new();
                    let handles: Vec<_> = (0..tasks)
                        .map(|i| serializer.submit(&format!("k{}", i % keys), move || async move { i }))
                        .collect();
                    for handle in handles {
                        black_box(handle.await.ok());
                    }
                })
            },
        );
    }

    for limit in [1usize, 3, 16] {
        let tasks = 1_024;
        group.throughput(Throughput::Elements(tasks as u64));
        group.bench_with_input(BenchmarkId::new("queue_submit", limit), &limit, |b, &limit| {
            b.to_async(&runtime).iter(|| async move {
                let queue = WorkQueue::new(limit);
                let handles: Vec<_> = (0..tasks)
                    .map(|i| queue.submit(move || async move { i }))
                    .collect();
                for handle in handles {
                    black_box(handle.await.ok());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_expiring_store, bench_deduplicator, bench_executors);
criterion_main!(benches);
