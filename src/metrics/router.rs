//! Router Metrics
//!
//! Counters for the routing decisions of a [`ShardRouter`](crate::router::ShardRouter).
//! Routing runs without any router-wide lock, so every counter is an
//! `AtomicU64` updated with relaxed ordering; a report is a best-effort
//! snapshot, not a consistent cut.

use super::ratio;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Routing counters shared by all callers of one router.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    inserts: AtomicU64,
    primary_skips: AtomicU64,
    replica_writes: AtomicU64,
    retrievals: AtomicU64,
    primary_hits: AtomicU64,
    replica_hits: AtomicU64,
    cold_misses: AtomicU64,
}

impl RouterMetrics {
    /// Counts a routed insert.
    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an insert that bypassed a degraded primary.
    pub(crate) fn record_primary_skip(&self) {
        self.primary_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `count` replica writes of one insert.
    pub(crate) fn record_replica_writes(&self, count: usize) {
        self.replica_writes
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Counts a retrieve answered by the primary.
    pub(crate) fn record_primary_hit(&self) {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        self.primary_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a retrieve answered by a replica.
    pub(crate) fn record_replica_hit(&self) {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        self.replica_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a retrieve no node could answer.
    pub(crate) fn record_cold_miss(&self) {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        self.cold_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of routed inserts.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Inserts that did not reach the primary because its shard was degraded.
    pub fn primary_skips(&self) -> u64 {
        self.primary_skips.load(Ordering::Relaxed)
    }

    /// Individual replica writes performed by insert fan-out.
    pub fn replica_writes(&self) -> u64 {
        self.replica_writes.load(Ordering::Relaxed)
    }

    /// Number of routed retrievals.
    pub fn retrievals(&self) -> u64 {
        self.retrievals.load(Ordering::Relaxed)
    }

    /// Retrievals answered by a primary.
    pub fn primary_hits(&self) -> u64 {
        self.primary_hits.load(Ordering::Relaxed)
    }

    /// Retrievals answered by a replica.
    pub fn replica_hits(&self) -> u64 {
        self.replica_hits.load(Ordering::Relaxed)
    }

    /// Retrievals that found nothing on any node of the shard.
    pub fn cold_misses(&self) -> u64 {
        self.cold_misses.load(Ordering::Relaxed)
    }

    /// Flattens the counters and rates into a metrics report.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let retrievals = self.retrievals();
        let mut metrics = BTreeMap::new();

        metrics.insert("cold_misses".to_string(), self.cold_misses() as f64);
        metrics.insert("inserts".to_string(), self.inserts() as f64);
        metrics.insert("primary_hits".to_string(), self.primary_hits() as f64);
        metrics.insert("primary_skips".to_string(), self.primary_skips() as f64);
        metrics.insert("replica_hits".to_string(), self.replica_hits() as f64);
        metrics.insert("replica_writes".to_string(), self.replica_writes() as f64);
        metrics.insert("retrievals".to_string(), retrievals as f64);

        metrics.insert(
            "cold_miss_rate".to_string(),
            ratio(self.cold_misses(), retrievals),
        );
        metrics.insert(
            "fallback_rate".to_string(),
            ratio(self.replica_hits(), retrievals),
        );

        metrics
    }
}
