//! Configuration management for Uncorded.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use uncorded_common::UncordedError;
use uncorded_common::constants::{
    BACKOFF_JITTER, BACKOFF_MAX_DELAY_MS, BACKOFF_MIN_DELAY_MS, DEFAULT_GC_INTERVAL_MS,
    DEFAULT_LISTEN_ADDR, DEFAULT_PEER_PORT, DEFAULT_POLL_INTERVAL_MS,
};

use crate::cluster::BackoffConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port appended to discovered peer addresses
    #[serde(default = "default_peer_port")]
    pub peer_port: u16,

    /// Collections created at startup
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,

    /// Expiring-set sweep interval in milliseconds
    #[serde(default = "default_gc_interval")]
    pub gc_interval_ms: u64,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Peer reconnect backoff
    #[serde(default)]
    pub backoff: BackoffSettings,
}

/// One named collection
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    pub name: String,

    /// Record lifetime; plain set when absent
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl CollectionConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

/// Membership discovery
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// `static` or `polling`
    #[serde(rename = "type", default = "default_discovery_type")]
    pub kind: String,

    /// Peer URLs for static discovery
    #[serde(default)]
    pub peers: Vec<String>,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub group: String,

    /// Membership endpoint for polling discovery
    #[serde(default)]
    pub source_url: Option<String>,

    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// This node's own address, dropped from polled membership
    #[serde(default)]
    pub self_address: Option<String>,
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// False when discovery can never produce a peer
    pub fn clustering_enabled(&self) -> bool {
        self.kind != "static" || !self.peers.is_empty()
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            kind: default_discovery_type(),
            peers: Vec::new(),
            region: String::new(),
            group: String::new(),
            source_url: None,
            interval_ms: default_poll_interval(),
            self_address: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

impl From<&BackoffSettings> for BackoffConfig {
    fn from(settings: &BackoffSettings) -> Self {
        BackoffConfig {
            min_delay: Duration::from_millis(settings.min_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_peer_port() -> u16 { DEFAULT_PEER_PORT }
fn default_gc_interval() -> u64 { DEFAULT_GC_INTERVAL_MS }
fn default_discovery_type() -> String { "static".to_string() }
fn default_poll_interval() -> u64 { DEFAULT_POLL_INTERVAL_MS }
fn default_min_delay() -> u64 { BACKOFF_MIN_DELAY_MS }
fn default_max_delay() -> u64 { BACKOFF_MAX_DELAY_MS }
fn default_jitter() -> f64 { BACKOFF_JITTER }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, listen_override: Option<&str>) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        if let Some(listen) = listen_override {
            config.listen_addr = listen.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot start a node
    pub fn validate(&self) -> Result<(), UncordedError> {
        if let Some(empty) = self.collections.iter().find(|c| c.name.trim().is_empty()) {
            return Err(UncordedError::Config(format!(
                "collection name must not be empty (ttl_ms = {:?})",
                empty.ttl_ms
            )));
        }
        if self.gc_interval_ms == 0 {
            return Err(UncordedError::Config("gc_interval_ms must be positive".to_string()));
        }
        if self.discovery.interval_ms == 0 {
            return Err(UncordedError::Config(
                "discovery.interval_ms must be positive".to_string(),
            ));
        }
        if self.backoff.min_delay_ms == 0 {
            return Err(UncordedError::Config(
                "backoff.min_delay_ms must be positive".to_string(),
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.min_delay_ms {
            return Err(UncordedError::Config(
                "backoff.max_delay_ms must not be below backoff.min_delay_ms".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            return Err(UncordedError::Config(format!(
                "backoff.jitter must be within 0.0..=1.0, got {}",
                self.backoff.jitter
            )));
        }
        Ok(())
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            peer_port: default_peer_port(),
            collections: Vec::new(),
            gc_interval_ms: default_gc_interval(),
            discovery: DiscoveryConfig::default(),
            backoff: BackoffSettings::default(),
        }
    }
}
