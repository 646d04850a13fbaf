//! # Uncorded
//!
//! Coordination-free store of named, replicated document sets. Every node
//! keeps local copies of its collections and streams full-state snapshots to
//! any peer that subscribes; peers merge what they receive.
//!
//! ## Architecture
//! ```text
//! Discovery ──► ClusterCoordinator ──► ResilientStream (one per peer)
//!                                           │ inbound records
//!                                           ▼
//!   HTTP API ──► SetRegistry ──► ReplicationChannel ──► Set / ExpiringSet
//!                                           │ snapshots
//!                                           ▼
//!                                 GET /sets/{a,b,...} subscribers
//! ```

pub mod cluster;
pub mod config;
pub mod crdt;
pub mod discovery;
pub mod replication;
pub mod routes;
pub mod state;

pub use cluster::{ClusterCoordinator, ResilientStream, StreamEvent};
pub use config::AppConfig;
pub use crdt::{ExpiringSet, ReplicatedSet, Set};
pub use discovery::{ClusterDiscovery, DiscoveryEvent};
pub use replication::{ReplicationChannel, SetRegistry};
pub use state::AppState;
