//! Replication channels and the collection registry.
//!
//! Implements:
//! - `ReplicationChannel` - wraps one set; local mutations broadcast full snapshots
//! - `SetRegistry` - explicitly constructed name → channel registry
//! - `gc_worker` - periodic expiry sweep over every registered collection

mod channel;
mod registry;
mod sweeper;

pub use channel::{ReplicationChannel, Subscription};
pub use registry::SetRegistry;
pub use sweeper::gc_worker;
