//! Request/response boundary in front of the router.
//!
//! [`CacheService`] is the only piece callers talk to. It forwards each call
//! to its [`ShardRouter`], logs the request and shapes the reply; it makes no
//! routing decisions of its own.

use crate::error::UnknownShard;
use crate::router::{Lookup, ShardHasher, ShardRouter};
use log::debug;
use std::fmt;
use std::hash::BuildHasher;

/// Why a retrieve came back without a value.
pub const COLD_MISS_REASON: &str = "cold-storage required";

/// Acknowledgement of an insert.
///
/// Always returned: the caller is not told whether every replica kept the
/// value, only that the write was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Reply to [`CacheService::retrieve_api`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrieveResponse {
    /// The cached value.
    Value(String),
    /// No node of the key's shard holds it; consult the backing store.
    ColdMiss,
}

impl RetrieveResponse {
    /// The cached value, or `None` on a cold miss.
    pub fn value(&self) -> Option<&str> {
        match self {
            RetrieveResponse::Value(value) => Some(value.as_str()),
            RetrieveResponse::ColdMiss => None,
        }
    }

    /// Returns `true` if the caller has to consult the backing store.
    pub fn is_cold_miss(&self) -> bool {
        matches!(self, RetrieveResponse::ColdMiss)
    }
}

impl From<Lookup> for RetrieveResponse {
    fn from(lookup: Lookup) -> Self {
        match lookup.into_value() {
            Some(value) => RetrieveResponse::Value(value),
            None => RetrieveResponse::ColdMiss,
        }
    }
}

impl fmt::Display for RetrieveResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrieveResponse::Value(value) => f.write_str(value),
            RetrieveResponse::ColdMiss => write!(f, "miss: {}", COLD_MISS_REASON),
        }
    }
}

/// Caller-facing wrapper around a [`ShardRouter`].
///
/// `Send + Sync`; share it through an `Arc` to serve callers on many threads.
pub struct CacheService<S = ShardHasher> {
    router: ShardRouter<S>,
}

impl<S: BuildHasher> CacheService<S> {
    /// Wraps a fully built router.
    pub fn new(router: ShardRouter<S>) -> Self {
        CacheService { router }
    }

    /// Routes the write to the key's shard and acknowledges it.
    pub fn insert_api(&self, key: &str, value: &str) -> Ack {
        debug!("insert key={} shard={}", key, self.router.shard_for(key));
        self.router.insert(key, value);
        Ack
    }

    /// Reads `key` from its shard, falling back to replicas.
    pub fn retrieve_api(&self, key: &str) -> RetrieveResponse {
        let lookup = self.router.retrieve(key);
        match lookup.served_by() {
            Some(served_by) => debug!("retrieve key={} hit {:?}", key, served_by),
            None => debug!("retrieve key={} {}", key, COLD_MISS_REASON),
        }
        lookup.into()
    }

    /// Takes the primary of `shard` out of rotation.
    pub fn mark_primary_down(&self, shard: usize) -> Result<(), UnknownShard> {
        self.router.mark_primary_down(shard)
    }

    /// Puts the primary of `shard` back in rotation.
    pub fn mark_primary_up(&self, shard: usize) -> Result<(), UnknownShard> {
        self.router.mark_primary_up(shard)
    }

    /// The shard `key` maps to, for diagnostics.
    pub fn shard_for(&self, key: &str) -> usize {
        self.router.shard_for(key)
    }

    /// The router behind this service.
    pub fn router(&self) -> &ShardRouter<S> {
        &self.router
    }

    /// Consumes the service and returns its router.
    pub fn into_router(self) -> ShardRouter<S> {
        self.router
    }
}

impl<S> fmt::Debug for CacheService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheService")
            .field("router", &self.router)
            .finish()
    }
}
