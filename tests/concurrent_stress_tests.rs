//! Concurrent Stress Tests
//!
//! High-contention workloads against the service and individual stores. These
//! tests check that nothing panics or deadlocks and that capacity bounds hold;
//! exact contents are covered by the correctness tests.

use scoped_threadpool::Pool;
use shard_cache::{CacheMetrics, CacheService, ClusterConfig, LruStore, ShardRouter};
use std::num::NonZeroUsize;

const NUM_THREADS: u32 = 16;
const OPS_PER_THREAD: usize = 5_000;

fn service(shard_count: usize, replicas: usize, capacity: usize) -> CacheService {
    let config = ClusterConfig {
        shard_count: NonZeroUsize::new(shard_count).unwrap(),
        replicas_per_shard: replicas,
        node_capacity: NonZeroUsize::new(capacity).unwrap(),
    };
    CacheService::new(ShardRouter::init(config.router_config(), config.descriptors()).unwrap())
}

fn assert_bounded(service: &CacheService, capacity: usize) {
    for node in service.router().nodes() {
        assert!(node.len() <= capacity, "{} holds {}", node.id(), node.len());
    }
}

/// Many threads hammering the same ten keys
#[test]
fn stress_high_contention() {
    let service = service(4, 2, 100);
    let mut pool = Pool::new(NUM_THREADS);

    pool.scoped(|scope| {
        for t in 0..NUM_THREADS as usize {
            let service = &service;
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = format!("k{}", i % 10);
                    if t % 2 == 0 {
                        service.insert_api(&key, &format!("{}", t * OPS_PER_THREAD + i));
                    } else {
                        let _ = service.retrieve_api(&key);
                    }
                }
            });
        }
    });

    assert_bounded(&service, 100);
}

/// Key space far larger than capacity keeps every node evicting
#[test]
fn stress_capacity_limits() {
    let service = service(8, 1, 32);
    let mut pool = Pool::new(NUM_THREADS);

    pool.scoped(|scope| {
        for t in 0..NUM_THREADS as usize {
            let service = &service;
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    service.insert_api(&format!("{}:{}", t, i), "v");
                }
            });
        }
    });

    assert_bounded(&service, 32);
    let report = service.router().metrics();
    assert_eq!(
        report.get("inserts"),
        Some(&((NUM_THREADS as usize * OPS_PER_THREAD) as f64))
    );
}

/// Single-entry nodes under mixed traffic
#[test]
fn stress_single_entry_nodes() {
    let service = service(2, 2, 1);
    let mut pool = Pool::new(NUM_THREADS);

    pool.scoped(|scope| {
        for t in 0..NUM_THREADS as usize {
            let service = &service;
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = format!("{}", (t + i) % 7);
                    if i % 2 == 0 {
                        service.insert_api(&key, "v");
                    } else {
                        let _ = service.retrieve_api(&key);
                    }
                }
            });
        }
    });

    assert_bounded(&service, 1);
}

/// Liveness flags toggled while traffic runs
#[test]
fn stress_mark_down_during_traffic() {
    let service = service(4, 1, 64);
    let mut pool = Pool::new(NUM_THREADS);

    pool.scoped(|scope| {
        for t in 0..NUM_THREADS as usize {
            let service = &service;
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = format!("k{}", i % 128);
                    match (t + i) % 5 {
                        0 => service.mark_primary_down(i % 4).unwrap(),
                        1 => service.mark_primary_up(i % 4).unwrap(),
                        2 | 3 => {
                            service.insert_api(&key, "v");
                        }
                        _ => {
                            let _ = service.retrieve_api(&key);
                        }
                    }
                }
            });
        }
    });

    assert_bounded(&service, 64);
    for shard in 0..4 {
        service.mark_primary_up(shard).unwrap();
    }
    assert_eq!(service.router().metrics().get("degraded_shards"), Some(&0.0));
}

/// A single store shared by every thread, with diagnostic reads mixed in
#[test]
fn stress_store_with_snapshots() {
    let store = LruStore::new(NonZeroUsize::new(50).unwrap());
    let mut pool = Pool::new(NUM_THREADS);

    pool.scoped(|scope| {
        for t in 0..NUM_THREADS as usize {
            let store = &store;
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = format!("{}", (t * 31 + i) % 200);
                    match i % 4 {
                        0 => {
                            let _ = store.get(&key);
                        }
                        1 => {
                            assert!(store.snapshot().len() <= 50);
                        }
                        _ => {
                            store.put(key, "v".to_string());
                        }
                    }
                }
            });
        }
    });

    assert_eq!(store.len(), 50);
    let metrics = store.store_metrics();
    assert_eq!(metrics.insertions - metrics.evictions, 50);
}
