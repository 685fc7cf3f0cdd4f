//! Benchmarks for the LRU cache engine.
//!
//! Targets:
//! - Hit path: `try_get_value` on a resident key (write lock + promotion)
//! - Miss path: `try_get_value` on an absent key
//! - Update path: `add_or_update` on a resident key (value cell + promotion)
//! - Eviction path: `add_or_update` of fresh keys into a full cache
//! - Idle sweep over a full cache of expired entries
//! - Contended mixed workload across 4 threads

use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use memocache_core::config::CacheConfig;
use memocache_core::lru_cache::LruCache;

fn filled_cache(capacity: usize) -> LruCache<u64, u64> {
    let cache = LruCache::new(capacity).unwrap();
    for k in 0..capacity as u64 {
        cache.add_or_update(k, k);
    }
    cache
}

fn bench_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_cache/hit");
    for capacity in [64usize, 4_096, 65_536] {
        let cache = filled_cache(capacity);
        let mut k = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &cap| {
            b.iter(|| {
                k = (k + 1) % cap as u64;
                black_box(cache.try_get_value(&k));
            });
        });
    }
    group.finish();
}

fn bench_miss(c: &mut Criterion) {
    let cache = filled_cache(4_096);
    c.bench_function("lru_cache/miss", |b| {
        b.iter(|| black_box(cache.try_get_value(&u64::MAX)));
    });
}

fn bench_update(c: &mut Criterion) {
    let cache = filled_cache(4_096);
    let mut k = 0u64;
    c.bench_function("lru_cache/update", |b| {
        b.iter(|| {
            k = (k + 7) % 4_096;
            cache.add_or_update(black_box(k), k);
        });
    });
}

fn bench_evict(c: &mut Criterion) {
    let cache = filled_cache(4_096);
    let mut next = 4_096u64;
    c.bench_function("lru_cache/evict_recycle", |b| {
        b.iter(|| {
            next += 1;
            cache.add_or_update(black_box(next), next);
        });
    });
}

fn bench_sweep(c: &mut Criterion) {
    let cfg = CacheConfig {
        capacity: 10_000,
        idle_ttl_ms: 1,
        sweep_interval_ms: 1,
    };
    c.bench_function("lru_cache/sweep_10k_expired", |b| {
        b.iter_batched(
            || {
                let cache = LruCache::with_config(&cfg).unwrap();
                for k in 0..10_000u64 {
                    cache.add_or_update(k, k);
                }
                cache
            },
            |cache| {
                let later = Instant::now() + Duration::from_secs(1);
                black_box(cache.purge_idle_at(later))
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_contended(c: &mut Criterion) {
    c.bench_function("lru_cache/contended_4_threads", |b| {
        b.iter_batched(
            || Arc::new(filled_cache(1_024)),
            |cache| {
                let handles: Vec<_> = (0..4u64)
                    .map(|t| {
                        let cache = Arc::clone(&cache);
                        thread::spawn(move || {
                            for i in 0..1_000u64 {
                                let key = (i * 31 + t) % 2_048;
                                if i % 4 == 0 {
                                    cache.add_or_update(key, i);
                                } else {
                                    black_box(cache.try_get_value(&key));
                                }
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_hit,
    bench_miss,
    bench_update,
    bench_evict,
    bench_sweep,
    bench_contended
);
criterion_main!(benches);
