//! Node registration with an external discovery service.
//!
//! The engine never talks to a coordination service on its own. Whoever brings
//! nodes up injects a [`DiscoveryClient`] and drives its lifecycle explicitly:
//! connect at startup, register each node once, disconnect at shutdown.
//!
//! Registrations follow the layout of an ephemeral-node tree: each node is
//! published at [`registration_path`] (`/cache/<id>`) with its role
//! (`primary` or `replica`) as payload, and disappears when the client
//! disconnects.

use crate::error::DiscoveryError;
use crate::node::{NodeDescriptor, NodeRole};
use log::{debug, info};
use std::collections::BTreeMap;

/// Parent path under which cache nodes are registered.
pub const REGISTRATION_ROOT: &str = "/cache";

/// Path a node with `id` is registered at.
pub fn registration_path(id: &str) -> String {
    format!("{}/{}", REGISTRATION_ROOT, id)
}

/// Capability to publish cache nodes to a discovery service.
pub trait DiscoveryClient {
    /// Opens the session. Registrations are only accepted while connected.
    fn connect(&mut self) -> Result<(), DiscoveryError>;

    /// Publishes `node` at its registration path.
    fn register(&mut self, node: &NodeDescriptor) -> Result<(), DiscoveryError>;

    /// Closes the session; the service drops every registration it made.
    fn disconnect(&mut self);

    /// Returns `true` while the session is open.
    fn is_connected(&self) -> bool;
}

/// A [`DiscoveryClient`] that keeps its registrations in memory.
///
/// Suitable for tests and single-process deployments.
///
/// # Examples
///
/// ```
/// use shard_cache::discovery::{DiscoveryClient, InMemoryDiscovery};
/// use shard_cache::node::{NodeDescriptor, NodeRole};
///
/// let mut discovery = InMemoryDiscovery::new();
/// discovery.connect().unwrap();
/// discovery.register(&NodeDescriptor::primary("P0", 0)).unwrap();
/// assert_eq!(discovery.role_at("/cache/P0"), Some(NodeRole::Primary));
///
/// discovery.disconnect();
/// assert!(discovery.registrations().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDiscovery {
    connected: bool,
    unreachable: Option<String>,
    registrations: BTreeMap<String, NodeRole>,
}

impl InMemoryDiscovery {
    /// Creates a disconnected client with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose `connect` always fails with `reason`.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        InMemoryDiscovery {
            unreachable: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Current registrations, keyed by path.
    pub fn registrations(&self) -> &BTreeMap<String, NodeRole> {
        &self.registrations
    }

    /// Role registered at `path`, if any.
    pub fn role_at(&self, path: &str) -> Option<NodeRole> {
        self.registrations.get(path).copied()
    }
}

impl DiscoveryClient for InMemoryDiscovery {
    fn connect(&mut self) -> Result<(), DiscoveryError> {
        if let Some(reason) = &self.unreachable {
            return Err(DiscoveryError::Unavailable(reason.clone()));
        }
        if !self.connected {
            self.connected = true;
            info!("discovery session established");
        }
        Ok(())
    }

    fn register(&mut self, node: &NodeDescriptor) -> Result<(), DiscoveryError> {
        if !self.connected {
            return Err(DiscoveryError::NotConnected);
        }
        let path = registration_path(&node.id);
        if self.registrations.contains_key(&path) {
            return Err(DiscoveryError::NodeExists(path));
        }
        debug!("registered {} as {}", path, node.role);
        self.registrations.insert(path, node.role);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.registrations.clear();
            info!("discovery session closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
