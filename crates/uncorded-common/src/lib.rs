//! # Uncorded Common
//!
//! Shared types, errors, and constants used across Uncorded components.
//!
//! ## Modules
//! - `types` - Wire types (AddRecord, SetState) exchanged between replicas
//! - `error` - Common error types
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::UncordedError;
pub use types::*;
