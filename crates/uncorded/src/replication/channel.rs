//! Bidirectional replication channel over a single set.
//!
//! Outbound: every local `add`/`remove` emits the *full* current state to
//! all subscribers (merge is idempotent, so resending everything is always
//! safe and no per-subscriber cursor is needed). Inbound: `merge` folds a
//! peer's state into the set.
//!
//! Mutation and emission happen under the same lock, so the Nth snapshot
//! reflects exactly the first N mutations.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;

use uncorded_common::constants::SNAPSHOT_BUFFER;
use uncorded_common::{AddRecord, Document, SetState};

use crate::crdt::ReplicatedSet;

pub struct ReplicationChannel {
    name: String,
    set: Mutex<Box<dyn ReplicatedSet>>,
    snapshots: broadcast::Sender<Arc<SetState>>,
}

impl std::fmt::Debug for ReplicationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationChannel")
            .field("name", &self.name)
            .field("subscribers", &self.snapshots.receiver_count())
            .finish()
    }
}

impl ReplicationChannel {
    pub fn new(name: impl Into<String>, set: impl ReplicatedSet + 'static) -> Self {
        let (snapshots, _) = broadcast::channel(SNAPSHOT_BUFFER);
        Self {
            name: name.into(),
            set: Mutex::new(Box::new(set)),
            snapshots,
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a document and emit the new state
    pub fn add(&self, doc: &Document) -> AddRecord {
        let mut set = self.set.lock();
        let record = set.add(doc);
        self.replicate(set.state());
        record
    }

    /// Remove a live record and emit the new state
    pub fn remove(&self, id: &str) -> Option<AddRecord> {
        let mut set = self.set.lock();
        let record = set.remove(id);
        self.replicate(set.state());
        record
    }

    pub fn get(&self, id: &str) -> Option<AddRecord> {
        self.set.lock().get(id)
    }

    /// Owned copy of the current state
    pub fn state(&self) -> SetState {
        self.set.lock().state().clone()
    }

    /// Merge a peer's state. Merges are not re-emitted.
    pub fn merge(&self, state: SetState) {
        self.set.lock().merge(state);
    }

    /// Drain an inbound channel of peer states into the set
    pub async fn merge_from(&self, mut input: mpsc::Receiver<SetState>) -> usize {
        let mut merged = 0;
        while let Some(state) = input.recv().await {
            self.merge(state);
            merged += 1;
        }
        merged
    }

    /// Sweep expired entries
    pub fn gc(&self) -> usize {
        self.set.lock().gc()
    }

    /// Attach an outbound subscriber.
    ///
    /// The subscription yields the current state first, then one snapshot
    /// per subsequent local mutation.
    pub fn subscribe(&self) -> Subscription {
        let set = self.set.lock();
        Subscription {
            initial: Some(Arc::new(set.state().clone())),
            snapshots: self.snapshots.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.snapshots.receiver_count()
    }

    fn replicate(&self, state: &SetState) {
        // No subscribers is fine: late joiners get the current state on subscribe.
        let _ = self.snapshots.send(Arc::new(state.clone()));
    }
}

/// Outbound snapshot feed from one channel
#[derive(Debug)]
pub struct Subscription {
    initial: Option<Arc<SetState>>,
    snapshots: broadcast::Receiver<Arc<SetState>>,
}

impl Subscription {
    /// Take the snapshot captured at subscribe time, if not yet consumed
    pub fn take_initial(&mut self) -> Option<Arc<SetState>> {
        self.initial.take()
    }

    /// Next snapshot. A subscriber that falls behind skips straight to the
    /// newest buffered snapshots; each one is complete, so nothing is lost.
    pub async fn next(&mut self) -> Option<Arc<SetState>> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.snapshots.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscriber lagged, skipping stale snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<SetState>> + Send + 'static {
        let updates = BroadcastStream::new(self.snapshots)
            .filter_map(|snapshot| futures::future::ready(snapshot.ok()));
        stream::iter(self.initial).chain(updates)
    }
}
