//! Set with a uniform per-item TTL.
//!
//! Items are checked for expiry when retrieved. Garbage collection walks the
//! expiry queue from its head, so a sweep costs O(k) in the number of
//! expired items and O(1) when nothing has expired.
//!
//! `addedAt` is captured on the adding replica's clock and is never
//! resynchronised, so replicas with skewed clocks disagree on exactly when
//! an item expires. Timestamp arithmetic saturates: peer-supplied values at
//! the ends of the `i64` range expire immediately or never.
//!
//! Records merged from a plain set carry no `addedAt`; their TTL starts on
//! arrival. Once such a record expires its id is retired, so a plain-set peer
//! re-sending it cannot bring it back.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use uncorded_common::{AddRecord, Document, SetState};

use super::{Clock, ExpiryQueue, ReplicatedSet, SystemClock, fresh_id};

#[derive(Debug)]
pub struct ExpiringSet {
    ttl_ms: i64,
    state: SetState,
    queue: ExpiryQueue,
    clock: Arc<dyn Clock>,
    /// Ids stamped on arrival because the sender had no `addedAt`
    unstamped: HashSet<String>,
    /// Expired unstamped ids that merges must not resurrect
    retired: HashSet<String>,
}

impl ExpiringSet {
    /// Create an expiring set on the system wall clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as i64,
            state: SetState::new(),
            queue: ExpiryQueue::new(),
            clock,
            unstamped: HashSet::new(),
            retired: HashSet::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms as u64)
    }

    /// Pending expiry entries, oldest first
    pub fn queue(&self) -> &ExpiryQueue {
        &self.queue
    }

    fn is_expired(&self, record: &AddRecord, now: i64) -> bool {
        record
            .added_at
            .is_some_and(|added_at| now.saturating_sub(added_at) >= self.ttl_ms)
    }

    fn evict(&mut self, id: &str) -> bool {
        let removed = self.state.adds.remove(id).is_some();
        self.state.removals.remove(id);
        if self.unstamped.remove(id) {
            self.retired.insert(id.to_string());
        }
        removed
    }
}

impl ReplicatedSet for ExpiringSet {
    fn add(&mut self, doc: &Document) -> AddRecord {
        let now = self.clock.now_ms();
        let record = AddRecord::new(fresh_id(&self.state), doc.clone()).with_added_at(now);
        self.state.adds.insert(record.id.clone(), record.clone());
        self.queue.push_back(record.id.clone(), now.saturating_add(self.ttl_ms));
        record
    }

    fn get(&mut self, id: &str) -> Option<AddRecord> {
        let record = self.state.adds.get(id)?;
        if self.is_expired(record, self.clock.now_ms()) {
            self.evict(id);
            return None;
        }
        if self.state.is_removed(id) {
            return None;
        }
        Some(record.clone())
    }

    fn remove(&mut self, id: &str) -> Option<AddRecord> {
        let record = self.get(id)?;
        self.state.removals.insert(id.to_string(), id.to_string());
        Some(record)
    }

    fn merge(&mut self, state: SetState) {
        let now = self.clock.now_ms();
        let mut already_expired = HashSet::new();

        for (id, mut record) in state.adds {
            if self.state.adds.contains_key(&id) || self.retired.contains(&id) {
                continue;
            }
            // Records from a plain set carry no timestamp: start their TTL now.
            let stamped = record.added_at.is_some();
            let added_at = *record.added_at.get_or_insert(now);
            let expires_at = added_at.saturating_add(self.ttl_ms);
            if expires_at <= now {
                already_expired.insert(id);
                continue;
            }
            if !stamped {
                self.unstamped.insert(id.clone());
            }
            self.queue.insert_sorted(id.clone(), expires_at);
            self.state.adds.insert(id, record);
        }

        self.state.removals.extend(state.removals.into_iter().filter(|(id, _)| {
            !already_expired.contains(id) && !self.retired.contains(id)
        }));
    }

    fn state(&self) -> &SetState {
        &self.state
    }

    fn gc(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.queue
            .pop_expired(now)
            .into_iter()
            .filter(|id| self.evict(id))
            .count()
    }
}
