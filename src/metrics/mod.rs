//! Cache Metrics
//!
//! Counters for the individual stores and for the router, reported through the
//! [`CacheMetrics`] trait as a `BTreeMap<String, f64>`.
//!
//! `BTreeMap` keeps the keys sorted, so two reports taken from the same state
//! always print identically. That matters more here than lookup speed: a
//! report holds about a dozen keys and is read by humans and tests.

use std::collections::BTreeMap;

/// Counters kept by the shard router.
pub mod router;
/// Counters kept by a single store.
pub mod store;

pub use router::RouterMetrics;
pub use store::StoreMetrics;

/// Uniform metrics reporting for stores, nodes and routers.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Name of the reporting component, e.g. `"LruStore"` or `"ShardRouter"`.
    fn component_name(&self) -> &'static str;
}

/// Ratio helper shared by the metric structs; `0.0` when nothing was counted.
pub(crate) fn ratio(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64
    } else {
        0.0
    }
}
