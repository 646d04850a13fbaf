//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::cluster::{BackoffConfig, ClusterCoordinator, HttpPeerConnector};
use crate::config::AppConfig;
use crate::replication::SetRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Named collections served and replicated by this node
    pub registry: Arc<SetRegistry>,

    /// Peer replication streams
    pub coordinator: Arc<ClusterCoordinator>,

    pub started_at: Instant,
}

impl AppState {
    /// Create every configured collection and the peer coordinator
    pub fn new(config: AppConfig, client: reqwest::Client) -> Result<Self> {
        let registry = Arc::new(SetRegistry::new());

        for collection in &config.collections {
            let created = match collection.ttl() {
                Some(ttl) => registry.create_expiring_set(&collection.name, ttl),
                None => registry.create_set(&collection.name),
            };
            created.with_context(|| format!("Failed to create collection `{}`", collection.name))?;
        }

        let connector = HttpPeerConnector::new(client, BackoffConfig::from(&config.backoff));
        let coordinator = Arc::new(ClusterCoordinator::new(
            registry.clone(),
            Arc::new(connector),
        ));

        Ok(Self {
            config,
            registry,
            coordinator,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
