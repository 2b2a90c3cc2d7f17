//! Cache nodes.
//!
//! A [`CacheNode`] is one [`LruStore`] plus the identity the rest of the
//! system knows it by: a stable id, a role and the shard it serves. Nodes are
//! built by the [`ShardRouter`](crate::router::ShardRouter) from
//! [`NodeDescriptor`]s and owned by it for their whole life, which is why the
//! mutating operations are crate-private. Everything outside the router only
//! gets the read-only inspection methods.

use crate::metrics::CacheMetrics;
use crate::store::LruStore;
use log::trace;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;

/// Whether a node is the primary of its shard or one of its replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Serves reads first and receives writes while alive.
    Primary,
    /// Receives every write and serves reads the primary cannot.
    Replica,
}

impl NodeRole {
    /// The role as published to the discovery service.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Replica => "replica",
        }
    }

    /// Returns `true` for [`NodeRole::Primary`].
    pub fn is_primary(self) -> bool {
        self == NodeRole::Primary
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a node as supplied by the discovery layer: `{id, role, shard}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeDescriptor {
    /// Stable id, unique across the cluster.
    pub id: String,
    /// Primary or replica.
    pub role: NodeRole,
    /// Index of the shard the node serves.
    pub shard: usize,
}

impl NodeDescriptor {
    /// Descriptor of the primary node of `shard`.
    pub fn primary(id: impl Into<String>, shard: usize) -> Self {
        NodeDescriptor {
            id: id.into(),
            role: NodeRole::Primary,
            shard,
        }
    }

    /// Descriptor of a replica node of `shard`.
    pub fn replica(id: impl Into<String>, shard: usize) -> Self {
        NodeDescriptor {
            id: id.into(),
            role: NodeRole::Replica,
            shard,
        }
    }
}

/// A single cache node: identity plus its own LRU store.
///
/// Role and id never change after construction.
pub struct CacheNode {
    id: String,
    role: NodeRole,
    shard: usize,
    store: LruStore,
}

impl CacheNode {
    /// Creates an empty node with a store of `capacity` entries.
    pub(crate) fn new(descriptor: NodeDescriptor, capacity: NonZeroUsize) -> Self {
        CacheNode {
            id: descriptor.id,
            role: descriptor.role,
            shard: descriptor.shard,
            store: LruStore::new(capacity),
        }
    }

    /// Stable node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this node is a primary or a replica.
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Index of the shard this node serves.
    pub fn shard(&self) -> usize {
        self.shard
    }

    /// The descriptor this node was built from, e.g. for registering it with
    /// a discovery service.
    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            id: self.id.clone(),
            role: self.role,
            shard: self.shard,
        }
    }

    /// Looks up `key`, promoting it to most recently used on a hit.
    pub(crate) fn retrieve(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Writes `key` into the store, logging any eviction.
    pub(crate) fn insert(&self, key: &str, value: &str) {
        if let Some((evicted, _)) = self.store.put(key.to_owned(), value.to_owned()) {
            trace!("node {} evicted {} to make room for {}", self.id, evicted, key);
        }
    }

    /// Reads `key` without changing recency.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.store.peek(key)
    }

    /// Returns `true` if the store holds `key`, without promoting it.
    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Number of entries in the store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Maximum number of entries the store holds.
    pub fn capacity(&self) -> NonZeroUsize {
        self.store.capacity()
    }

    /// Copies the node's entries, most recently used first.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.store.snapshot()
    }

    /// Copies the node's keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }
}

impl CacheMetrics for CacheNode {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.store.metrics()
    }

    fn component_name(&self) -> &'static str {
        "CacheNode"
    }
}

impl fmt::Debug for CacheNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheNode")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("shard", &self.shard)
            .field("store", &self.store)
            .finish()
    }
}
