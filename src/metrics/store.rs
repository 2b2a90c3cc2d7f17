//! Store Metrics
//!
//! Counters kept by a single [`LruStore`](crate::store::LruStore). They live
//! inside the store's lock and are only touched by `get` and `put`; the
//! non-promoting diagnostic reads do not count as requests.

use super::ratio;
use std::collections::BTreeMap;

/// Request and mutation counters for one LRU store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Number of `get` calls.
    pub requests: u64,

    /// Number of `get` calls that found their key.
    pub hits: u64,

    /// Number of `put` calls that added a new key.
    pub insertions: u64,

    /// Number of `put` calls that overwrote an existing key.
    pub updates: u64,

    /// Number of entries dropped to make room for a new key.
    pub evictions: u64,
}

impl StoreMetrics {
    /// Counts a `get` that found its key.
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.hits += 1;
    }

    /// Counts a `get` that did not find its key.
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    /// Counts a `put` that added a new key.
    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    /// Counts a `put` that overwrote an existing key.
    pub fn record_update(&mut self) {
        self.updates += 1;
    }

    /// Counts an entry dropped to make room.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Misses are not counted separately; they are the requests without a hit.
    pub fn misses(&self) -> u64 {
        self.requests - self.hits
    }

    /// Share of requests that hit, between 0.0 and 1.0.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.requests)
    }

    /// Share of requests that missed, between 0.0 and 1.0.
    pub fn miss_rate(&self) -> f64 {
        ratio(self.misses(), self.requests)
    }

    /// Share of insertions that displaced an entry, between 0.0 and 1.0.
    pub fn eviction_rate(&self) -> f64 {
        ratio(self.evictions, self.insertions)
    }

    /// Flattens the counters and rates into a metrics report.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("cache_hits".to_string(), self.hits as f64);
        metrics.insert("cache_misses".to_string(), self.misses() as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("updates".to_string(), self.updates as f64);

        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("miss_rate".to_string(), self.miss_rate());

        if self.insertions > 0 {
            metrics.insert("eviction_rate".to_string(), self.eviction_rate());
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_metrics_rates() {
        let mut metrics = StoreMetrics::default();
        assert_eq!(metrics.hit_rate(), 0.0);
        assert_eq!(metrics.miss_rate(), 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        assert_eq!(metrics.requests, 4);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.hit_rate(), 0.75);
        assert_eq!(metrics.miss_rate(), 0.25);
    }

    #[test]
    fn test_store_metrics_report() {
        let mut metrics = StoreMetrics::default();
        let report = metrics.to_btreemap();
        assert_eq!(report.get("requests"), Some(&0.0));
        assert!(!report.contains_key("eviction_rate"));

        metrics.record_insertion();
        metrics.record_insertion();
        metrics.record_update();
        metrics.record_eviction();
        metrics.record_miss();

        let report = metrics.to_btreemap();
        assert_eq!(report.get("insertions"), Some(&2.0));
        assert_eq!(report.get("updates"), Some(&1.0));
        assert_eq!(report.get("evictions"), Some(&1.0));
        assert_eq!(report.get("cache_misses"), Some(&1.0));
        assert_eq!(report.get("eviction_rate"), Some(&0.5));

        let keys: Vec<_> = report.keys().cloned().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_eviction_rate_on_write_heavy_store() {
        let mut metrics = StoreMetrics::default();
        for i in 0..10 {
            metrics.record_insertion();
            if i >= 2 {
                metrics.record_eviction();
            }
        }
        metrics.record_hit();

        assert_eq!(metrics.eviction_rate(), 0.8);
        let report = metrics.to_btreemap();
        assert_eq!(report.get("eviction_rate"), Some(&0.8));
        assert!(report["eviction_rate"] <= 1.0);
    }
}
