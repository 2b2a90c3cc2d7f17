//! Shard Router
//!
//! Maps keys to shards and applies the write fan-out and read fallback policy.
//!
//! # How It Works
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                            ShardRouter                                │
//! │                                                                       │
//! │  hash(key) % shard_count  ──▶  Shard selection                        │
//! │                                                                       │
//! │  ┌───────────────────────┐       ┌───────────────────────┐            │
//! │  │ Shard 0   alive: bool │  ...  │ Shard N-1 alive: bool │            │
//! │  │  ┌─────────┐          │       │  ┌─────────┐          │            │
//! │  │  │ Primary │          │       │  │ Primary │          │            │
//! │  │  └─────────┘          │       │  └─────────┘          │            │
//! │  │  ┌─────────┐┌───────┐ │       │  ┌─────────┐          │            │
//! │  │  │Replica 0││Repl. 1│ │       │  │Replica 0│          │            │
//! │  │  └─────────┘└───────┘ │       │  └─────────┘          │            │
//! │  └───────────────────────┘       └───────────────────────┘            │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every node has its own store lock and every shard has its own atomic
//! liveness flag, so there is no router-wide lock at all.
//!
//! ## Writes
//!
//! An insert goes to the shard's primary when it is alive and, regardless of
//! the primary, to every replica in configured order. The call returns once all
//! replicas have the write. Nothing makes primary and replicas change together:
//! a crash halfway through the fan-out leaves the shard's nodes disagreeing,
//! and nothing repairs that.
//!
//! ## Reads
//!
//! A retrieve asks the primary first when it is alive, then scans the replicas
//! in configured order. The first hit wins. When no node of the shard holds the
//! key, the result is [`Lookup::ColdMiss`]: the caller has to go to the backing
//! store.
//!
//! ## Liveness
//!
//! A shard is [`ShardState::Healthy`] until an external health check calls
//! [`ShardRouter::mark_primary_down`]; it stays [`ShardState::Degraded`] until
//! [`ShardRouter::mark_primary_up`]. Writes the primary missed while degraded
//! are not replayed when it comes back.

use crate::config::RouterConfig;
use crate::error::{ConfigError, UnknownShard};
use crate::metrics::{CacheMetrics, RouterMetrics};
use crate::node::{CacheNode, NodeDescriptor, NodeRole};
use log::{debug, info, trace, warn};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{BuildHasher, BuildHasherDefault};
use std::sync::atomic::{AtomicBool, Ordering};

/// Default hasher for [`ShardRouter::shard_for`].
///
/// SipHash with fixed keys: unlike a randomly seeded hasher, every router
/// built by the same binary maps a key to the same shard.
pub type ShardHasher = BuildHasherDefault<DefaultHasher>;

/// Which node answered a successful retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    /// The shard's primary.
    Primary,
    /// Position of the replica in the shard's configured replica order.
    Replica(usize),
}

/// Outcome of [`ShardRouter::retrieve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A node of the shard held the key.
    Hit {
        /// The cached value.
        value: String,
        /// The node that answered.
        served_by: ServedBy,
    },
    /// Neither the primary nor any replica of the shard holds the key.
    ColdMiss,
}

impl Lookup {
    /// The value found, or `None` on a cold miss.
    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Hit { value, .. } => Some(value.as_str()),
            Lookup::ColdMiss => None,
        }
    }

    /// Consumes the lookup and returns the value found, if any.
    pub fn into_value(self) -> Option<String> {
        match self {
            Lookup::Hit { value, .. } => Some(value),
            Lookup::ColdMiss => None,
        }
    }

    /// The node that answered, or `None` on a cold miss.
    pub fn served_by(&self) -> Option<ServedBy> {
        match self {
            Lookup::Hit { served_by, .. } => Some(*served_by),
            Lookup::ColdMiss => None,
        }
    }

    /// Returns `true` if no node of the shard held the key.
    pub fn is_cold_miss(&self) -> bool {
        matches!(self, Lookup::ColdMiss)
    }
}

/// Health of a shard's primary as last reported by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    /// The primary is in service.
    Healthy,
    /// The primary is marked down; replicas carry the shard.
    Degraded,
}

/// One partition of the keyspace: a primary, its replicas and the primary's
/// liveness flag.
pub struct Shard {
    index: usize,
    primary: CacheNode,
    replicas: Vec<CacheNode>,
    primary_alive: AtomicBool,
}

impl Shard {
    fn new(index: usize, primary: CacheNode, replicas: Vec<CacheNode>) -> Self {
        Shard {
            index,
            primary,
            replicas,
            primary_alive: AtomicBool::new(true),
        }
    }

    /// Position of this shard in the router.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The shard's primary node.
    pub fn primary(&self) -> &CacheNode {
        &self.primary
    }

    /// Replicas in configured order, which is also the fallback scan order.
    pub fn replicas(&self) -> &[CacheNode] {
        &self.replicas
    }

    /// The primary followed by the replicas.
    pub fn nodes(&self) -> impl Iterator<Item = &CacheNode> + '_ {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }

    /// Returns `true` unless the primary has been marked down.
    pub fn is_primary_alive(&self) -> bool {
        self.primary_alive.load(Ordering::Acquire)
    }

    /// Health of the shard derived from its primary's liveness flag.
    pub fn state(&self) -> ShardState {
        if self.is_primary_alive() {
            ShardState::Healthy
        } else {
            ShardState::Degraded
        }
    }

    fn insert(&self, key: &str, value: &str, metrics: &RouterMetrics) {
        if self.is_primary_alive() {
            self.primary.insert(key, value);
        } else {
            metrics.record_primary_skip();
            trace!(
                "shard {} is degraded, {} not written to primary {}",
                self.index,
                key,
                self.primary.id()
            );
        }

        for replica in &self.replicas {
            replica.insert(key, value);
        }
        metrics.record_replica_writes(self.replicas.len());
    }

    fn retrieve(&self, key: &str, metrics: &RouterMetrics) -> Lookup {
        if self.is_primary_alive() {
            if let Some(value) = self.primary.retrieve(key) {
                metrics.record_primary_hit();
                return Lookup::Hit {
                    value,
                    served_by: ServedBy::Primary,
                };
            }
        }

        for (position, replica) in self.replicas.iter().enumerate() {
            if let Some(value) = replica.retrieve(key) {
                metrics.record_replica_hit();
                trace!("{} served from replica {} of shard {}", key, replica.id(), self.index);
                return Lookup::Hit {
                    value,
                    served_by: ServedBy::Replica(position),
                };
            }
        }

        metrics.record_cold_miss();
        Lookup::ColdMiss
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("index", &self.index)
            .field("state", &self.state())
            .field("primary", &self.primary)
            .field("replicas", &self.replicas)
            .finish()
    }
}

/// Routes keys to shards and owns every node of the shard table.
///
/// # Examples
///
/// ```
/// use shard_cache::config::RouterConfig;
/// use shard_cache::node::NodeDescriptor;
/// use shard_cache::router::{Lookup, ServedBy, ShardRouter};
/// use std::num::NonZeroUsize;
///
/// let config = RouterConfig {
///     shard_count: NonZeroUsize::new(1).unwrap(),
///     node_capacity: NonZeroUsize::new(16).unwrap(),
/// };
/// let router = ShardRouter::init(
///     config,
///     vec![NodeDescriptor::primary("P0", 0), NodeDescriptor::replica("R0-0", 0)],
/// )
/// .unwrap();
///
/// router.insert("user:1", "Ada");
/// router.mark_primary_down(0).unwrap();
/// assert_eq!(
///     router.retrieve("user:1"),
///     Lookup::Hit { value: "Ada".to_string(), served_by: ServedBy::Replica(0) }
/// );
/// assert!(router.retrieve("user:2").is_cold_miss());
/// ```
pub struct ShardRouter<S = ShardHasher> {
    shards: Box<[Shard]>,
    hash_builder: S,
    metrics: RouterMetrics,
}

impl ShardRouter<ShardHasher> {
    /// Builds the shard table from node descriptors.
    ///
    /// Replicas keep the order in which their descriptors appear. Fails if a
    /// shard in `0..shard_count` has no primary or more than one, if a
    /// descriptor names a shard outside that range, or if two descriptors
    /// share an id.
    pub fn init<I>(config: RouterConfig, descriptors: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = NodeDescriptor>,
    {
        Self::init_with_hasher(config, descriptors, ShardHasher::default())
    }
}

impl<S: BuildHasher> ShardRouter<S> {
    /// Like [`init`](ShardRouter::init), with a custom hasher for shard selection.
    pub fn init_with_hasher<I>(
        config: RouterConfig,
        descriptors: I,
        hash_builder: S,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = NodeDescriptor>,
    {
        let shard_count = config.shard_count.get();
        let mut primaries: Vec<Option<CacheNode>> = (0..shard_count).map(|_| None).collect();
        let mut replicas: Vec<Vec<CacheNode>> = (0..shard_count).map(|_| Vec::new()).collect();
        let mut ids = HashSet::new();

        for descriptor in descriptors {
            let shard = descriptor.shard;
            if shard >= shard_count {
                return Err(ConfigError::ShardOutOfRange {
                    node: descriptor.id,
                    shard,
                    shard_count,
                });
            }
            if !ids.insert(descriptor.id.clone()) {
                return Err(ConfigError::DuplicateNodeId(descriptor.id));
            }

            match descriptor.role {
                NodeRole::Primary => {
                    if let Some(existing) = &primaries[shard] {
                        return Err(ConfigError::DuplicatePrimary {
                            shard,
                            existing: existing.id().to_owned(),
                            duplicate: descriptor.id,
                        });
                    }
                    primaries[shard] = Some(CacheNode::new(descriptor, config.node_capacity));
                }
                NodeRole::Replica => {
                    replicas[shard].push(CacheNode::new(descriptor, config.node_capacity));
                }
            }
        }

        let shards = primaries
            .into_iter()
            .zip(replicas)
            .enumerate()
            .map(|(index, (primary, replicas))| {
                let primary = primary.ok_or(ConfigError::MissingPrimary { shard: index })?;
                Ok(Shard::new(index, primary, replicas))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        debug!(
            "shard table ready: {} shards, {} nodes, {} entries per node",
            shards.len(),
            ids.len(),
            config.node_capacity
        );

        Ok(ShardRouter {
            shards: shards.into_boxed_slice(),
            hash_builder,
            metrics: RouterMetrics::default(),
        })
    }

    /// Returns the shard index for `key`: `hash(key) % shard_count`.
    ///
    /// Pure and stable for the lifetime of the router.
    #[inline]
    pub fn shard_for(&self, key: &str) -> usize {
        let shard = self.hash_builder.hash_one(key) % self.shards.len() as u64;
        shard as usize
    }

    /// Writes to the primary (when alive) and to every replica of the key's shard.
    pub fn insert(&self, key: &str, value: &str) {
        self.metrics.record_insert();
        self.shards[self.shard_for(key)].insert(key, value, &self.metrics);
    }

    /// Reads from the primary (when alive), falling back to the replicas in order.
    pub fn retrieve(&self, key: &str) -> Lookup {
        self.shards[self.shard_for(key)].retrieve(key, &self.metrics)
    }

    /// Stops using the shard's primary for reads and writes.
    ///
    /// Idempotent. The primary keeps whatever it holds.
    pub fn mark_primary_down(&self, shard: usize) -> Result<(), UnknownShard> {
        let entry = self.shard_entry(shard)?;
        if entry.primary_alive.swap(false, Ordering::AcqRel) {
            warn!(
                "primary {} of shard {} is down, reads fall back to {} replicas",
                entry.primary.id(),
                shard,
                entry.replicas.len()
            );
        }
        Ok(())
    }

    /// Puts the shard's primary back in service.
    ///
    /// Idempotent. Writes the primary missed while it was down are not replayed,
    /// so it may answer with stale values or miss keys the replicas hold.
    pub fn mark_primary_up(&self, shard: usize) -> Result<(), UnknownShard> {
        let entry = self.shard_entry(shard)?;
        if !entry.primary_alive.swap(true, Ordering::AcqRel) {
            info!("primary {} of shard {} is back up", entry.primary.id(), shard);
        }
        Ok(())
    }

    /// Liveness flag of the primary of `shard`.
    pub fn is_primary_alive(&self, shard: usize) -> Result<bool, UnknownShard> {
        Ok(self.shard_entry(shard)?.is_primary_alive())
    }

    /// Health of `shard`.
    pub fn shard_state(&self, shard: usize) -> Result<ShardState, UnknownShard> {
        Ok(self.shard_entry(shard)?.state())
    }

    /// Number of shards, fixed at construction.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard at `index`, if it exists.
    pub fn shard(&self, index: usize) -> Option<&Shard> {
        self.shards.get(index)
    }

    /// All shards in index order.
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Every node of the shard table, shard by shard, primary first.
    pub fn nodes(&self) -> impl Iterator<Item = &CacheNode> + '_ {
        self.shards.iter().flat_map(|shard| shard.nodes())
    }

    /// Routing counters of this router.
    pub fn router_metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    fn shard_entry(&self, shard: usize) -> Result<&Shard, UnknownShard> {
        self.shards.get(shard).ok_or(UnknownShard {
            shard,
            shard_count: self.shards.len(),
        })
    }
}

impl<S: BuildHasher> CacheMetrics for ShardRouter<S> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.metrics.to_btreemap();
        let degraded = self
            .shards
            .iter()
            .filter(|shard| !shard.is_primary_alive())
            .count();
        metrics.insert("degraded_shards".to_string(), degraded as f64);
        metrics.insert("shards".to_string(), self.shards.len() as f64);
        metrics
    }

    fn component_name(&self) -> &'static str {
        "ShardRouter"
    }
}

impl<S> fmt::Debug for ShardRouter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardRouter")
            .field("shards", &self.shards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn config(shard_count: usize, node_capacity: usize) -> RouterConfig {
        RouterConfig {
            shard_count: NonZeroUsize::new(shard_count).unwrap(),
            node_capacity: NonZeroUsize::new(node_capacity).unwrap(),
        }
    }

    fn single_shard(replicas: usize) -> ShardRouter {
        let mut descriptors = vec![NodeDescriptor::primary("P0", 0)];
        for r in 0..replicas {
            descriptors.push(NodeDescriptor::replica(format!("R0-{}", r), 0));
        }
        ShardRouter::init(config(1, 8), descriptors).unwrap()
    }

    #[test]
    fn test_init_rejects_missing_primary() {
        let err = ShardRouter::init(
            config(2, 4),
            vec![
                NodeDescriptor::primary("P0", 0),
                NodeDescriptor::replica("R1-0", 1),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingPrimary { shard: 1 });
    }

    #[test]
    fn test_init_rejects_unregistered_shard() {
        let err = ShardRouter::init(
            config(1, 4),
            vec![
                NodeDescriptor::primary("P0", 0),
                NodeDescriptor::replica("R3-0", 3),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ShardOutOfRange {
                node: "R3-0".to_string(),
                shard: 3,
                shard_count: 1,
            }
        );
    }

    #[test]
    fn test_init_rejects_second_primary() {
        let err = ShardRouter::init(
            config(1, 4),
            vec![NodeDescriptor::primary("P0", 0), NodeDescriptor::primary("P0b", 0)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicatePrimary {
                shard: 0,
                existing: "P0".to_string(),
                duplicate: "P0b".to_string(),
            }
        );
    }

    #[test]
    fn test_init_rejects_duplicate_ids() {
        let err = ShardRouter::init(
            config(2, 4),
            vec![NodeDescriptor::primary("N", 0), NodeDescriptor::primary("N", 1)],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateNodeId("N".to_string()));
    }

    #[test]
    fn test_init_keeps_replica_order() {
        let router = ShardRouter::init(
            config(1, 4),
            vec![
                NodeDescriptor::replica("B", 0),
                NodeDescriptor::primary("P", 0),
                NodeDescriptor::replica("A", 0),
            ],
        )
        .unwrap();
        let shard = router.shard(0).unwrap();
        assert_eq!(shard.primary().id(), "P");
        let ids: Vec<_> = shard.replicas().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        let all: Vec<_> = router.nodes().map(|n| n.id()).collect();
        assert_eq!(all, vec!["P", "B", "A"]);
    }

    #[test]
    fn test_shard_for_is_stable() {
        let router = ShardRouter::init(
            config(4, 4),
            (0..4).map(|s| NodeDescriptor::primary(format!("P{}", s), s)),
        )
        .unwrap();
        let twin = ShardRouter::init(
            config(4, 4),
            (0..4).map(|s| NodeDescriptor::primary(format!("P{}", s), s)),
        )
        .unwrap();

        for i in 0..100 {
            let key = format!("user:{}", i);
            let shard = router.shard_for(&key);
            assert!(shard < 4);
            assert_eq!(shard, router.shard_for(&key));
            assert_eq!(shard, twin.shard_for(&key), "fixed-key hasher");
        }
    }

    #[test]
    fn test_insert_fans_out_to_all_nodes() {
        let router = single_shard(2);
        router.insert("k", "v");
        for node in router.nodes() {
            assert_eq!(node.peek("k"), Some("v".to_string()), "{}", node.id());
        }
    }

    #[test]
    fn test_insert_skips_degraded_primary() {
        let router = single_shard(2);
        router.mark_primary_down(0).unwrap();
        router.insert("k", "v");

        let shard = router.shard(0).unwrap();
        assert!(!shard.primary().contains("k"));
        assert!(shard.replicas().iter().all(|r| r.contains("k")));
        assert_eq!(router.router_metrics().primary_skips(), 1);
    }

    #[test]
    fn test_retrieve_prefers_primary() {
        let router = single_shard(1);
        router.insert("k", "v");
        assert_eq!(
            router.retrieve("k"),
            Lookup::Hit {
                value: "v".to_string(),
                served_by: ServedBy::Primary
            }
        );
    }

    #[test]
    fn test_retrieve_falls_back_when_primary_misses() {
        let router = single_shard(2);
        router.mark_primary_down(0).unwrap();
        router.insert("k", "v");
        router.mark_primary_up(0).unwrap();

        // the primary is alive again but never saw the write
        let lookup = router.retrieve("k");
        assert_eq!(lookup.served_by(), Some(ServedBy::Replica(0)));
        assert_eq!(lookup.value(), Some("v"));
    }

    #[test]
    fn test_degraded_read_does_not_touch_primary() {
        let router = single_shard(2);
        router.insert("k", "v");
        router.mark_primary_down(0).unwrap();

        assert_eq!(router.retrieve("k").into_value(), Some("v".to_string()));
        let primary = router.shard(0).unwrap().primary();
        assert_eq!(primary.metrics().get("requests"), Some(&0.0));
    }

    #[test]
    fn test_cold_miss() {
        let router = single_shard(2);
        let lookup = router.retrieve("nothing");
        assert!(lookup.is_cold_miss());
        assert_eq!(lookup.value(), None);
        assert_eq!(router.router_metrics().cold_misses(), 1);
    }

    #[test]
    fn test_shard_without_replicas_degrades_to_cold_miss() {
        let router = single_shard(0);
        router.insert("k", "v");
        router.mark_primary_down(0).unwrap();
        assert!(router.retrieve("k").is_cold_miss());
    }

    #[test]
    fn test_liveness_transitions() {
        let router = single_shard(1);
        assert_eq!(router.shard_state(0), Ok(ShardState::Healthy));

        router.mark_primary_down(0).unwrap();
        router.mark_primary_down(0).unwrap();
        assert_eq!(router.shard_state(0), Ok(ShardState::Degraded));
        assert_eq!(router.is_primary_alive(0), Ok(false));

        router.mark_primary_up(0).unwrap();
        assert_eq!(router.shard_state(0), Ok(ShardState::Healthy));
        assert_eq!(router.metrics().get("degraded_shards"), Some(&0.0));
    }

    #[test]
    fn test_liveness_rejects_unknown_shard() {
        let router = single_shard(1);
        let expected = UnknownShard {
            shard: 5,
            shard_count: 1,
        };
        assert_eq!(router.mark_primary_down(5), Err(expected));
        assert_eq!(router.mark_primary_up(5), Err(expected));
        assert_eq!(router.shard_state(5), Err(expected));
        assert_eq!(router.shard_state(0), Ok(ShardState::Healthy));
    }

    #[test]
    fn test_custom_hasher() {
        #[derive(Clone, Default)]
        struct ZeroHasher;
        impl std::hash::Hasher for ZeroHasher {
            fn finish(&self) -> u64 {
                0
            }
            fn write(&mut self, _bytes: &[u8]) {}
        }

        let router = ShardRouter::init_with_hasher(
            config(3, 4),
            (0..3).map(|s| NodeDescriptor::primary(format!("P{}", s), s)),
            BuildHasherDefault::<ZeroHasher>::default(),
        )
        .unwrap();
        assert_eq!(router.shard_for("anything"), 0);
        assert_eq!(router.shard_for("else"), 0);
    }
}
