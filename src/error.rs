//! Error types.
//!
//! Misses are not errors and never show up here: a per-store miss is `None`
//! and a miss across a whole shard is [`Lookup::ColdMiss`](crate::router::Lookup).
//! The only fatal condition in the engine is a broken shard table at
//! construction time.

use thiserror::Error;

/// The shard table described by the node descriptors cannot be built.
///
/// Returned by [`ShardRouter::init`](crate::router::ShardRouter::init); a router
/// is never handed out when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configured shard has no primary node.
    #[error("shard {shard} has no primary node")]
    MissingPrimary {
        /// Shard without a primary.
        shard: usize,
    },

    /// A shard was given more than one primary node.
    #[error("shard {shard} already has primary {existing}, refusing {duplicate}")]
    DuplicatePrimary {
        /// Shard with more than one primary.
        shard: usize,
        /// Id of the primary accepted first.
        existing: String,
        /// Id of the rejected primary.
        duplicate: String,
    },

    /// A node references a shard index outside of the configured shard range.
    #[error("node {node} references shard {shard}, but only {shard_count} shards are configured")]
    ShardOutOfRange {
        /// Id of the offending node.
        node: String,
        /// Shard index it asked for.
        shard: usize,
        /// Number of configured shards.
        shard_count: usize,
    },

    /// Two nodes share an id.
    #[error("node id {0} is used more than once")]
    DuplicateNodeId(String),
}

/// A liveness signal named a shard the router does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("shard {shard} does not exist (shard count is {shard_count})")]
pub struct UnknownShard {
    /// Shard index that was requested.
    pub shard: usize,
    /// Number of shards the router has.
    pub shard_count: usize,
}

/// Failures reported by a [`DiscoveryClient`](crate::discovery::DiscoveryClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// `register` was called outside an open session.
    #[error("discovery client is not connected")]
    NotConnected,

    /// A node is already registered at this path.
    #[error("a node is already registered at {0}")]
    NodeExists(String),

    /// The discovery service could not be reached.
    #[error("discovery service unavailable: {0}")]
    Unavailable(String),
}

/// Bringing up a [`Cluster`](crate::cluster::Cluster) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    /// The shard table could not be built.
    #[error("invalid shard configuration: {0}")]
    Config(#[from] ConfigError),

    /// Connecting or registering a node failed.
    #[error("node registration failed: {0}")]
    Discovery(#[from] DiscoveryError),
}
