//! Common error types for Uncorded components.

use thiserror::Error;

/// Common errors across Uncorded components
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UncordedError {
    /// Invalid operator-supplied configuration (raised before serving)
    #[error("Configuration error: {0}")]
    Config(String),

    /// `unregister` called for an address with no active registration
    #[error("Peer not found: {url}")]
    PeerNotFound { url: String },

    /// Collection name not present in the local registry
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Collection name already registered
    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    /// Peer unreachable, dropped, or prematurely ended stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Membership query failed
    #[error("Discovery error (region={region}, group={group}): {message}")]
    Discovery {
        region: String,
        group: String,
        message: String,
    },

    /// Inbound record could not be decoded
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl UncordedError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::PeerNotFound { .. } => 404,
            Self::UnknownCollection(_) => 404,
            Self::CollectionExists(_) => 409,
            Self::Transport(_) => 502,
            Self::Discovery { .. } => 503,
            Self::MalformedRecord(_) => 400,
            Self::InvalidInput(_) => 400,
        }
    }

    /// Returns true if this error is recovered by retrying later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Discovery { .. })
    }
}
