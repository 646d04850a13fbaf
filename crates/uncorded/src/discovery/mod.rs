//! Cluster membership discovery.
//!
//! A `ClusterDiscovery` is a producer task plus a consumer-facing event
//! channel. Two producers exist:
//! - `fixed`: a static peer list, announced once
//! - `polling`: periodic queries against a `MembershipSource`, diffed by set
//!   membership
//!
//! `drive` feeds the events into a `ClusterCoordinator`.

mod http_source;
mod polling;
mod static_list;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use uncorded_common::UncordedError;
use uncorded_common::constants::events;

use crate::cluster::ClusterCoordinator;
use crate::config::AppConfig;

pub use http_source::HttpMembershipSource;
pub use polling::{MembershipSource, PollingOptions};

/// Membership change
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// A connectable peer URL joined
    PeerAdded(String),
    /// A previously announced peer URL left
    PeerRemoved(String),
    /// The membership source failed; discovery keeps running
    Error(UncordedError),
}

impl DiscoveryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryEvent::PeerAdded(_) => events::PEER_ADDED,
            DiscoveryEvent::PeerRemoved(_) => events::PEER_REMOVED,
            DiscoveryEvent::Error(_) => events::ERROR,
        }
    }
}

/// Handle to a running discovery producer
#[derive(Debug)]
pub struct ClusterDiscovery {
    events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Sending half handed to producer tasks
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    events: mpsc::UnboundedSender<DiscoveryEvent>,
    token: CancellationToken,
}

impl EventSink {
    /// Returns false once the consumer is gone or discovery was stopped
    pub(crate) fn emit(&self, event: DiscoveryEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.events.send(event).is_ok()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl ClusterDiscovery {
    /// Announce every address in `peers` once
    pub fn fixed(peers: Vec<String>) -> Self {
        Self::spawn(|sink| static_list::run(peers, sink))
    }

    /// Poll `source` on an interval and announce membership changes
    pub fn polling(source: Arc<dyn MembershipSource>, options: PollingOptions) -> Self {
        Self::spawn(|sink| polling::run(source, options, sink))
    }

    /// Build the discovery variant named by the configuration.
    ///
    /// Fails before anything is spawned when the configuration is unusable.
    pub fn from_config(config: &AppConfig, client: reqwest::Client) -> Result<Self, UncordedError> {
        let discovery = &config.discovery;
        match discovery.kind.as_str() {
            "static" => {
                if !discovery.clustering_enabled() {
                    tracing::warn!("Clustering disabled: static discovery has no peers");
                }
                Ok(Self::fixed(discovery.peers.clone()))
            }
            "polling" => {
                let source_url = discovery.source_url.clone().ok_or_else(|| {
                    UncordedError::Config("polling discovery requires `source_url`".to_string())
                })?;
                let source = Arc::new(HttpMembershipSource::new(client, source_url));
                Ok(Self::polling(
                    source,
                    PollingOptions {
                        region: discovery.region.clone(),
                        group: discovery.group.clone(),
                        interval: discovery.interval(),
                        port: config.peer_port,
                        self_address: discovery.self_address.clone(),
                    },
                ))
            }
            other => Err(UncordedError::Config(format!(
                "unknown discovery type `{}` (expected `static` or `polling`)",
                other
            ))),
        }
    }

    fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let task = tokio::spawn(producer(EventSink {
            events: tx,
            token: token.clone(),
        }));
        Self {
            events,
            token,
            task: Some(task),
        }
    }

    /// Next membership event, or `None` once the producer is done or stopped
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Stop producing events; pending ones are discarded
    pub fn stop(&mut self) {
        self.token.cancel();
        self.events.close();
        while self.events.try_recv().is_ok() {}
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ClusterDiscovery {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Apply discovery events to the coordinator until shutdown
pub async fn drive(
    mut discovery: ClusterDiscovery,
    coordinator: Arc<ClusterCoordinator>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.recv() => break,
            event = discovery.next_event() => event,
        };

        let Some(event) = event else {
            tracing::debug!("Discovery source finished");
            break;
        };
        tracing::debug!(event = event.name(), "Discovery event");

        match event {
            DiscoveryEvent::PeerAdded(url) => {
                coordinator.register(&url);
            }
            DiscoveryEvent::PeerRemoved(url) => {
                if let Err(e) = coordinator.unregister(&url).await {
                    tracing::warn!(url = %url, error = %e, "Failed to unregister peer");
                }
            }
            DiscoveryEvent::Error(e) => {
                tracing::error!(error = %e, retryable = e.is_retryable(), "Discovery error");
            }
        }
    }

    discovery.stop();
}
