//! Shared constants for Uncorded components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default port appended to discovered peer addresses
pub const DEFAULT_PEER_PORT: u16 = 8080;

/// Default membership poll interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Default expiring-set garbage collection interval (milliseconds)
pub const DEFAULT_GC_INTERVAL_MS: u64 = 1000;

/// Reconnect backoff floor (milliseconds)
pub const BACKOFF_MIN_DELAY_MS: u64 = 10;

/// Reconnect backoff ceiling (milliseconds)
pub const BACKOFF_MAX_DELAY_MS: u64 = 1000;

/// Reconnect backoff jitter factor (+/- fraction of the base delay)
pub const BACKOFF_JITTER: f64 = 0.25;

/// Snapshots buffered per collection before a slow subscriber skips ahead
pub const SNAPSHOT_BUFFER: usize = 64;

/// Longest accepted line on a replication stream (bytes)
pub const MAX_RECORD_LINE_BYTES: usize = 16 * 1024 * 1024;

/// HTTP route and wire-format constants
pub mod wire {
    /// Replication route prefix: /sets/{a,b,...}
    pub const SETS_PREFIX: &str = "/sets/";

    /// Separator between collection names in a subscription path
    pub const NAME_SEPARATOR: char = ',';

    /// Terminator appended after every streamed record
    pub const RECORD_DELIMITER: &str = "\r\n";

    /// Content type of the replication stream
    pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

    /// Reason reported when a peer closes the replication response
    pub const SERVER_ENDED_REQUEST: &str = "server ended request";
}

/// Discovery event names (mirrors the push-source contract)
pub mod events {
    pub const PEER_ADDED: &str = "peer-added";
    pub const PEER_REMOVED: &str = "peer-removed";
    pub const ERROR: &str = "error";
}
