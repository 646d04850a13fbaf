//! Named collection registry.
//!
//! Built once at startup and handed by reference to the HTTP layer and the
//! cluster coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use uncorded_common::UncordedError;
use uncorded_common::constants::wire::NAME_SEPARATOR;

use super::ReplicationChannel;
use crate::crdt::{ExpiringSet, ReplicatedSet, Set};

#[derive(Debug, Default)]
pub struct SetRegistry {
    channels: RwLock<HashMap<String, Arc<ReplicationChannel>>>,
}

impl SetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a plain replicated set
    pub fn create_set(&self, name: &str) -> Result<Arc<ReplicationChannel>, UncordedError> {
        self.register(name, Set::new())
    }

    /// Create a replicated set whose items expire after `ttl`
    pub fn create_expiring_set(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Arc<ReplicationChannel>, UncordedError> {
        self.register(name, ExpiringSet::new(ttl))
    }

    /// Wrap `set` in a replication channel and register it under `name`
    pub fn register(
        &self,
        name: &str,
        set: impl ReplicatedSet + 'static,
    ) -> Result<Arc<ReplicationChannel>, UncordedError> {
        validate_name(name)?;

        let mut channels = self.channels.write();
        if channels.contains_key(name) {
            return Err(UncordedError::CollectionExists(name.to_string()));
        }

        let channel = Arc::new(ReplicationChannel::new(name, set));
        channels.insert(name.to_string(), channel.clone());
        tracing::info!(collection = %name, "Collection created");
        Ok(channel)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ReplicationChannel>> {
        self.channels.read().get(name).cloned()
    }

    /// Look up a collection, failing with `UnknownCollection`
    pub fn require(&self, name: &str) -> Result<Arc<ReplicationChannel>, UncordedError> {
        self.get(name)
            .ok_or_else(|| UncordedError::UnknownCollection(name.to_string()))
    }

    /// Registered collection names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Split requested names into known channels (request order, deduplicated)
    /// and unknown names
    pub fn resolve<'a>(
        &self,
        requested: impl IntoIterator<Item = &'a str>,
    ) -> (Vec<Arc<ReplicationChannel>>, Vec<String>) {
        let channels = self.channels.read();
        let mut found: Vec<Arc<ReplicationChannel>> = Vec::new();
        let mut missing = Vec::new();

        for name in requested {
            match channels.get(name) {
                Some(channel) => {
                    if !found.iter().any(|c| c.name() == name) {
                        found.push(channel.clone());
                    }
                }
                None => missing.push(name.to_string()),
            }
        }
        (found, missing)
    }

    pub fn channels(&self) -> Vec<Arc<ReplicationChannel>> {
        self.channels.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep expired entries from every collection
    pub fn gc_all(&self) -> usize {
        self.channels().iter().map(|c| c.gc()).sum()
    }
}

fn validate_name(name: &str) -> Result<(), UncordedError> {
    if name.is_empty() {
        return Err(UncordedError::InvalidInput(
            "collection name must not be empty".to_string(),
        ));
    }
    if name.contains(NAME_SEPARATOR) || name.contains('/') {
        return Err(UncordedError::InvalidInput(format!(
            "collection name '{}' must not contain ',' or '/'",
            name
        )));
    }
    Ok(())
}
