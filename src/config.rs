//! Configuration
//!
//! Configuration structs have public fields and are built directly, the same
//! way for a single router as for a whole cluster:
//!
//! | Config | Used by | Description |
//! |--------|---------|-------------|
//! | [`RouterConfig`] | [`ShardRouter::init`](crate::router::ShardRouter::init) | Shard count and per-node capacity |
//! | [`ClusterConfig`] | [`Cluster::start`](crate::cluster::Cluster::start) | Shard layout with generated node ids |
//!
//! # Sizing
//!
//! `node_capacity` bounds every node independently. A key lives on its shard's
//! primary and on each replica, so the number of distinct keys a shard can hold
//! is `node_capacity`, not `node_capacity × (1 + replicas)`. Giving primaries and
//! replicas the same capacity keeps their eviction in lock step as long as they
//! see the same writes in the same order.
//!
//! # Examples
//!
//! ```
//! use shard_cache::config::ClusterConfig;
//! use std::num::NonZeroUsize;
//!
//! let config = ClusterConfig {
//!     shard_count: NonZeroUsize::new(4).unwrap(),
//!     replicas_per_shard: 1,
//!     node_capacity: NonZeroUsize::new(10_000).unwrap(),
//! };
//! assert_eq!(config.descriptors().len(), 8);
//! ```

use crate::node::NodeDescriptor;
use std::fmt;
use std::num::NonZeroUsize;

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("value must be non-zero"),
    }
}

const DEFAULT_SHARD_COUNT: NonZeroUsize = non_zero(2);
const DEFAULT_REPLICAS_PER_SHARD: usize = 2;
const DEFAULT_NODE_CAPACITY: NonZeroUsize = non_zero(3);

// Upper bound on the preallocation in `descriptors`; larger layouts just grow.
const MAX_CAPACITY_HINT: usize = 1024;

/// Shape of the shard table a router is built with.
///
/// The shard count is fixed for the router's lifetime. Changing it remaps
/// almost every key to a different shard; there is no rebalancing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Number of shards; every index in `0..shard_count` needs a primary.
    pub shard_count: NonZeroUsize,
    /// Maximum number of entries each node's store holds.
    pub node_capacity: NonZeroUsize,
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("shard_count", &self.shard_count)
            .field("node_capacity", &self.node_capacity)
            .finish()
    }
}

/// Uniform cluster layout: every shard gets one primary and the same number
/// of replicas.
///
/// Node ids are generated as `P<shard>` for primaries and
/// `R<shard>-<replica>` for replicas.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Number of shards, each with its own primary.
    pub shard_count: NonZeroUsize,
    /// Replicas created for every shard; zero leaves the primary alone.
    pub replicas_per_shard: usize,
    /// Maximum number of entries each node's store holds.
    pub node_capacity: NonZeroUsize,
}

impl ClusterConfig {
    /// The shard count and node capacity as a [`RouterConfig`].
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            shard_count: self.shard_count,
            node_capacity: self.node_capacity,
        }
    }

    /// Total number of nodes in the layout, saturating at `usize::MAX`.
    pub fn node_count(&self) -> usize {
        self.shard_count
            .get()
            .saturating_mul(self.replicas_per_shard.saturating_add(1))
    }

    /// Descriptors for every node of the layout, shard by shard, primary first.
    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        let mut descriptors = Vec::with_capacity(self.node_count().min(MAX_CAPACITY_HINT));
        for shard in 0..self.shard_count.get() {
            descriptors.push(NodeDescriptor::primary(format!("P{}", shard), shard));
            for replica in 0..self.replicas_per_shard {
                descriptors.push(NodeDescriptor::replica(
                    format!("R{}-{}", shard, replica),
                    shard,
                ));
            }
        }
        descriptors
    }
}

impl Default for ClusterConfig {
    /// Two shards with two replicas each, three entries per node.
    fn default() -> Self {
        ClusterConfig {
            shard_count: DEFAULT_SHARD_COUNT,
            replicas_per_shard: DEFAULT_REPLICAS_PER_SHARD,
            node_capacity: DEFAULT_NODE_CAPACITY,
        }
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("shard_count", &self.shard_count)
            .field("replicas_per_shard", &self.replicas_per_shard)
            .field("node_capacity", &self.node_capacity)
            .finish()
    }
}
