//! Peer connection seam.
//!
//! The coordinator only needs "open a stream of events for this URL" and
//! "stop it". Production wires `HttpPeerConnector`; tests substitute stubs.

use async_trait::async_trait;

use super::backoff::BackoffConfig;
use super::stream::{ResilientStream, StreamEvent};

/// A live event feed from one peer
#[async_trait]
pub trait PeerStream: Send {
    /// Next event, or `None` once the feed is finished or stopped
    async fn next_event(&mut self) -> Option<StreamEvent>;

    /// Stop the feed; no event may be delivered afterwards
    fn stop(&mut self);
}

/// Factory for peer streams
pub trait PeerConnector: Send + Sync {
    fn connect(&self, url: &str) -> Box<dyn PeerStream>;
}

#[async_trait]
impl PeerStream for ResilientStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        ResilientStream::next_event(self).await
    }

    fn stop(&mut self) {
        ResilientStream::stop(self);
    }
}

/// Opens a `ResilientStream` over HTTP for every peer
#[derive(Debug, Clone)]
pub struct HttpPeerConnector {
    client: reqwest::Client,
    backoff: BackoffConfig,
}

impl HttpPeerConnector {
    pub fn new(client: reqwest::Client, backoff: BackoffConfig) -> Self {
        Self { client, backoff }
    }
}

impl PeerConnector for HttpPeerConnector {
    fn connect(&self, url: &str) -> Box<dyn PeerStream> {
        Box::new(ResilientStream::connect(
            url,
            self.client.clone(),
            self.backoff,
        ))
    }
}
