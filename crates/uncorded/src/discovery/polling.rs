//! Polling membership discovery.
//!
//! Each tick fetches the current healthy-address list from a
//! `MembershipSource` and diffs it against the previous successful fetch.
//! The first successful fetch announces every address. The node's own
//! address, when configured, is never announced. A failed fetch emits
//! an error event and keeps the previous membership; the next poll is always
//! scheduled.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use uncorded_common::UncordedError;

use super::{DiscoveryEvent, EventSink};

/// External list of healthy peer addresses (hosts or IPs, no port)
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn list(&self, region: &str, group: &str) -> Result<Vec<String>, UncordedError>;
}

#[derive(Debug, Clone)]
pub struct PollingOptions {
    pub region: String,
    pub group: String,
    pub interval: Duration,
    /// Port appended to every address to build a peer URL
    pub port: u16,
    /// This node's address as the membership source reports it
    pub self_address: Option<String>,
}

pub(crate) async fn run(
    source: Arc<dyn MembershipSource>,
    options: PollingOptions,
    sink: EventSink,
) {
    let mut known: Vec<String> = Vec::new();

    tracing::info!(
        region = %options.region,
        group = %options.group,
        interval = ?options.interval,
        "Membership polling started"
    );

    loop {
        let result = tokio::select! {
            () = sink.token().cancelled() => return,
            result = source.list(&options.region, &options.group) => result,
        };

        match result {
            Ok(mut addresses) => {
                if let Some(own) = &options.self_address {
                    addresses.retain(|addr| addr != own);
                }
                let current = dedup(addresses);
                for event in diff(&known, &current, options.port) {
                    if !sink.emit(event) {
                        return;
                    }
                }
                known = current;
            }
            Err(e) => {
                tracing::warn!(
                    region = %options.region,
                    group = %options.group,
                    error = %e,
                    "Membership poll failed"
                );
                if !sink.emit(DiscoveryEvent::Error(with_query(e, &options))) {
                    return;
                }
            }
        }

        tokio::select! {
            () = sink.token().cancelled() => return,
            () = tokio::time::sleep(options.interval) => {}
        }
    }
}

fn dedup(addresses: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|addr| seen.insert(addr.clone()))
        .collect()
}

/// Added addresses (in `current` order) followed by removed ones (in `previous` order)
fn diff(previous: &[String], current: &[String], port: u16) -> Vec<DiscoveryEvent> {
    let before: HashSet<&String> = previous.iter().collect();
    let after: HashSet<&String> = current.iter().collect();

    let added = current
        .iter()
        .filter(|addr| !before.contains(addr))
        .map(|addr| DiscoveryEvent::PeerAdded(peer_url(addr, port)));
    let removed = previous
        .iter()
        .filter(|addr| !after.contains(addr))
        .map(|addr| DiscoveryEvent::PeerRemoved(peer_url(addr, port)));

    added.chain(removed).collect()
}

fn peer_url(address: &str, port: u16) -> String {
    format!("http://{}:{}", address, port)
}

fn with_query(error: UncordedError, options: &PollingOptions) -> UncordedError {
    let message = match error {
        UncordedError::Discovery { message, .. } => message,
        other => other.to_string(),
    };
    UncordedError::Discovery {
        region: options.region.clone(),
        group: options.group.clone(),
        message,
    }
}
