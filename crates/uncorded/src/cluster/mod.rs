//! Cluster replication modules.
//!
//! Implements:
//! - Fibonacci reconnect backoff with jitter
//! - Resilient newline-delimited JSON stream to one peer
//! - Coordinator mapping peer addresses to live replication streams

mod backoff;
mod coordinator;
mod peer;
mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::{BackoffConfig, FibonacciBackoff};
pub use coordinator::{ClusterCoordinator, route_record, subscription_url};
pub use peer::{HttpPeerConnector, PeerConnector, PeerStream};
pub use stream::{ResilientStream, StreamEvent, StreamState};
