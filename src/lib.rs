#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`LruStore`] | Capacity-bounded string store with recency eviction |
//! | [`CacheNode`] | One store plus a node id, a role and a shard index |
//! | [`ShardRouter`] | Key to shard mapping, write fan-out, read fallback |
//! | [`CacheService`] | Caller-facing insert/retrieve API |
//! | [`Cluster`] | Bring-up and shutdown with node registration |
//!
//! ## Request Flow
//!
//! ```text
//! insert_api(k, v)                         retrieve_api(k)
//!       │                                        │
//!       ▼                                        ▼
//!  shard = hash(k) % N                     shard = hash(k) % N
//!       │                                        │
//!       ├─▶ primary.insert   (if alive)          ├─▶ primary.retrieve (if alive) ──▶ hit?
//!       ├─▶ replica[0].insert                    ├─▶ replica[0].retrieve ─────────▶ hit?
//!       └─▶ replica[n].insert                    ├─▶ replica[n].retrieve ─────────▶ hit?
//!                                                └─▶ ColdMiss
//! ```
//!
//! ## Using a single store
//!
//! ```rust
//! use shard_cache::LruStore;
//! use std::num::NonZeroUsize;
//!
//! let store = LruStore::new(NonZeroUsize::new(2).unwrap());
//! store.put("a".to_string(), "1".to_string());
//! store.put("b".to_string(), "2".to_string());
//! store.get("a");
//! let evicted = store.put("c".to_string(), "3".to_string());
//! assert_eq!(evicted, Some(("b".to_string(), "2".to_string())));
//! ```
//!
//! ## Reading metrics
//!
//! ```rust
//! use shard_cache::{CacheMetrics, CacheService, ClusterConfig, ShardRouter};
//!
//! let config = ClusterConfig::default();
//! let router = ShardRouter::init(config.router_config(), config.descriptors()).unwrap();
//! let service = CacheService::new(router);
//!
//! service.insert_api("user:1", "Yash");
//! service.retrieve_api("user:1");
//! service.retrieve_api("user:9");
//!
//! let report = service.router().metrics();
//! assert_eq!(report.get("retrievals"), Some(&2.0));
//! assert_eq!(report.get("cold_misses"), Some(&1.0));
//! ```

#![warn(missing_docs)]

/// Bring-up of a cache tier against a discovery service.
pub mod cluster;

/// Router and cluster configuration structures.
pub mod config;

/// Registration of cache nodes with a discovery service.
pub mod discovery;

/// Error types.
pub mod error;

/// Intrusive doubly linked list backing every store.
///
/// **Note**: internal infrastructure. It hands out raw node pointers and relies
/// on the store to uphold its invariants.
pub(crate) mod list;

/// Store and router counters.
pub mod metrics;

/// Cache nodes and their descriptors.
pub mod node;

/// Key to shard mapping with replica fan-out and fallback.
pub mod router;

/// Caller-facing request API.
pub mod service;

/// Least Recently Used (LRU) store.
pub mod store;

pub use cluster::Cluster;
pub use config::{ClusterConfig, RouterConfig};
pub use discovery::{DiscoveryClient, InMemoryDiscovery};
pub use error::{ConfigError, DiscoveryError, StartupError, UnknownShard};
pub use metrics::CacheMetrics;
pub use node::{CacheNode, NodeDescriptor, NodeRole};
pub use router::{Lookup, ServedBy, ShardHasher, ShardRouter, ShardState};
pub use service::{Ack, CacheService, RetrieveResponse};
pub use store::LruStore;
