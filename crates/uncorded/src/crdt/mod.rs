//! Conflict-free replicated sets.
//!
//! Implements:
//! - `Set` - add/remove set with tombstones, merge is union
//! - `ExpiringSet` - `Set` with a uniform per-item TTL and queue-driven GC
//! - `ExpiryQueue` - arena-backed, time-ordered expiry queue

mod clock;
mod expiring_set;
mod expiry_queue;
mod set;

#[cfg(test)]
mod properties;

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub use clock::ManualClock;
pub use expiring_set::ExpiringSet;
pub use expiry_queue::{ExpiryEntry, ExpiryQueue};
pub use set::Set;

use uncorded_common::{AddRecord, Document, SetState};
use uuid::Uuid;

/// Operations shared by every replicated set flavour.
///
/// Merge must be commutative, associative and idempotent so replicas
/// converge no matter how often or in which order states are exchanged.
pub trait ReplicatedSet: Send {
    /// Store a copy of `doc` under a fresh id
    fn add(&mut self, doc: &Document) -> AddRecord;

    /// Look up a live record. Takes `&mut self` so implementations can evict lazily.
    fn get(&mut self, id: &str) -> Option<AddRecord>;

    /// Tombstone `id` if it is currently live locally
    fn remove(&mut self, id: &str) -> Option<AddRecord>;

    /// Union another replica's state into this one
    fn merge(&mut self, state: SetState);

    /// Read-only view of the full state
    fn state(&self) -> &SetState;

    /// Evict expired entries, returning how many were dropped
    fn gc(&mut self) -> usize {
        0
    }
}

/// Generate an id that is not already present in `state`
pub(crate) fn fresh_id(state: &SetState) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !state.adds.contains_key(&id) && !state.is_removed(&id) {
            return id;
        }
    }
}
