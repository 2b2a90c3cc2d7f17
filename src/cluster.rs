//! Cluster bring-up and shutdown.
//!
//! Ties the engine to its discovery collaborator: [`Cluster::start`] connects
//! the injected [`DiscoveryClient`], builds the shard table, registers every
//! node and hands out the [`CacheService`]. [`Cluster::shutdown`] closes the
//! discovery session again. Any failure during start is fatal: the session is
//! closed and no service is returned.

use crate::config::{ClusterConfig, RouterConfig};
use crate::discovery::{registration_path, DiscoveryClient};
use crate::error::StartupError;
use crate::node::NodeDescriptor;
use crate::router::ShardRouter;
use crate::service::CacheService;
use log::{error, info};
use std::fmt;

/// A running cache tier: the service plus the discovery session its nodes
/// are registered with.
pub struct Cluster<D: DiscoveryClient> {
    service: CacheService,
    discovery: D,
}

impl<D: DiscoveryClient> Cluster<D> {
    /// Starts a cluster with the uniform layout of `config`.
    pub fn start(config: ClusterConfig, discovery: D) -> Result<Self, StartupError> {
        Self::start_with_descriptors(config.router_config(), config.descriptors(), discovery)
    }

    /// Starts a cluster from an explicit list of node descriptors.
    pub fn start_with_descriptors<I>(
        config: RouterConfig,
        descriptors: I,
        mut discovery: D,
    ) -> Result<Self, StartupError>
    where
        I: IntoIterator<Item = NodeDescriptor>,
    {
        discovery.connect()?;

        let router = match ShardRouter::init(config, descriptors) {
            Ok(router) => router,
            Err(err) => {
                error!("refusing to start: {}", err);
                discovery.disconnect();
                return Err(err.into());
            }
        };

        for node in router.nodes() {
            if let Err(err) = discovery.register(&node.descriptor()) {
                error!("failed to register node {}: {}", node.id(), err);
                discovery.disconnect();
                return Err(err.into());
            }
            info!(
                "registered node {} at {} ({})",
                node.id(),
                registration_path(node.id()),
                node.role()
            );
        }

        info!(
            "cache cluster started with {} shards",
            router.shard_count()
        );
        Ok(Cluster {
            service: CacheService::new(router),
            discovery,
        })
    }

    /// The service callers send requests to.
    pub fn service(&self) -> &CacheService {
        &self.service
    }

    /// The discovery client the nodes are registered with.
    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// Disconnects from discovery and returns the client.
    ///
    /// The cache contents are dropped with the cluster.
    pub fn shutdown(mut self) -> D {
        self.discovery.disconnect();
        info!("cache cluster stopped");
        self.discovery
    }
}

impl<D: DiscoveryClient> fmt::Debug for Cluster<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("service", &self.service)
            .field("discovery_connected", &self.discovery.is_connected())
            .finish()
    }
}
