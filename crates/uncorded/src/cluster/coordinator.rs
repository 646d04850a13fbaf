//! Cluster coordinator.
//!
//! Maps each peer address to one replication stream subscribed to every
//! local collection and routes inbound records into the matching channels.
//!
//! The subscription URL is built from the registry's collection names at
//! `register` time, so collections created after startup replicate to peers
//! that join afterwards (existing peers pick them up on re-registration).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use uncorded_common::constants::wire::{NAME_SEPARATOR, SETS_PREFIX};
use uncorded_common::{SetState, UncordedError};

use super::peer::{PeerConnector, PeerStream};
use super::stream::StreamEvent;
use crate::replication::SetRegistry;

struct Peer {
    url: String,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Peer {
    /// Stop the stream and wait until its listener has detached
    async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!(url = %self.url, error = %e, "Peer task panicked");
            }
        }
    }
}

pub struct ClusterCoordinator {
    registry: Arc<SetRegistry>,
    connector: Arc<dyn PeerConnector>,
    peers: Mutex<HashMap<String, Peer>>,
}

impl ClusterCoordinator {
    pub fn new(registry: Arc<SetRegistry>, connector: Arc<dyn PeerConnector>) -> Self {
        Self {
            registry,
            connector,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Start replicating from `peer_address`; returns the subscription URL.
    ///
    /// Registering an address that is already tracked replaces its stream.
    pub fn register(&self, peer_address: &str) -> String {
        let names = self.registry.names();
        if names.is_empty() {
            tracing::warn!(peer = %peer_address, "No local collections, peer stream will carry no data");
        }
        let url = subscription_url(peer_address, &names);
        let stream = self.connector.connect(&url);
        let token = CancellationToken::new();
        let task = tokio::spawn(run_peer(
            stream,
            self.registry.clone(),
            url.clone(),
            names,
            token.clone(),
        ));

        tracing::info!(url = %url, "Peer registered");

        let previous = self.peers.lock().insert(
            peer_address.to_string(),
            Peer {
                url: url.clone(),
                token,
                task,
            },
        );
        if let Some(previous) = previous {
            tracing::info!(url = %previous.url, "Replaced existing peer registration");
            previous.token.cancel();
        }
        url
    }

    /// Stop replicating from `peer_address`.
    ///
    /// Fails with `PeerNotFound` before touching anything when the address is
    /// not registered. Once this returns no further record from that peer is
    /// merged.
    pub async fn unregister(&self, peer_address: &str) -> Result<(), UncordedError> {
        let peer = self
            .peers
            .lock()
            .remove(peer_address)
            .ok_or_else(|| UncordedError::PeerNotFound {
                url: peer_address.to_string(),
            })?;

        tracing::info!(url = %peer_address, "Peer unregistered");
        peer.shutdown().await;
        Ok(())
    }

    /// Unregister every peer
    pub async fn stop(&self) {
        let peers: Vec<Peer> = self.peers.lock().drain().map(|(_, peer)| peer).collect();
        for peer in peers {
            peer.shutdown().await;
        }
    }

    /// Registered peer addresses, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<_> = self.peers.lock().keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn is_registered(&self, peer_address: &str) -> bool {
        self.peers.lock().contains_key(peer_address)
    }

    pub fn registry(&self) -> &Arc<SetRegistry> {
        &self.registry
    }
}

/// `{peer}/sets/{a,b,...}`
pub fn subscription_url(peer_address: &str, names: &[String]) -> String {
    let separator = NAME_SEPARATOR.to_string();
    format!(
        "{}{}{}",
        peer_address.trim_end_matches('/'),
        SETS_PREFIX,
        names.join(&separator)
    )
}

async fn run_peer(
    mut stream: Box<dyn PeerStream>,
    registry: Arc<SetRegistry>,
    url: String,
    requested: Vec<String>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = token.cancelled() => break,
            event = stream.next_event() => event,
        };

        match event {
            Some(StreamEvent::Connected) => {
                tracing::info!(url = %url, "Peer connection established");
            }
            Some(StreamEvent::ConnectionError(reason)) => {
                tracing::warn!(url = %url, error = %reason, "Peer connection failure");
            }
            Some(StreamEvent::Data(record)) => {
                if let Err(e) = route_record(&registry, &requested, record) {
                    tracing::warn!(url = %url, error = %e, "Dropping inbound record");
                }
            }
            None => break,
        }
    }

    stream.stop();
}

/// Merge one inbound record into the local collections it names.
///
/// A record is keyed by collection name. When a single collection was
/// requested the peer may also send its bare `SetState`. Every key is decoded
/// before any merge is applied, so a record is applied whole or not at all;
/// keys naming unknown collections are skipped. Returns how many collections
/// were merged.
pub fn route_record(
    registry: &SetRegistry,
    requested: &[String],
    record: Value,
) -> Result<usize, UncordedError> {
    let Value::Object(map) = record else {
        return Err(UncordedError::MalformedRecord(
            "expected a JSON object".to_string(),
        ));
    };

    let keyed = match requested {
        [only] if !map.contains_key(only) && map.contains_key("adds") => {
            vec![(only.clone(), Value::Object(map))]
        }
        _ => map.into_iter().collect(),
    };

    let mut updates = Vec::with_capacity(keyed.len());
    for (name, value) in keyed {
        let Some(channel) = registry.get(&name) else {
            tracing::warn!(collection = %name, "Ignoring state for unknown collection");
            continue;
        };
        let state: SetState = serde_json::from_value(value)
            .map_err(|e| UncordedError::MalformedRecord(format!("{}: {}", name, e)))?;
        updates.push((channel, state));
    }

    let merged = updates.len();
    for (channel, state) in updates {
        channel.merge(state);
    }
    Ok(merged)
}
