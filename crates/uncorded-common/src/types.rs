//! Core types shared between replicas.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Opaque caller-supplied document.
///
/// Sets store their own copy, so later changes to the caller's value never
/// reach stored state.
pub type Document = serde_json::Value;

/// A single addition to a replicated set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRecord {
    /// 128-bit random identifier, unique for the lifetime of the set
    pub id: String,
    /// Stored copy of the caller's document
    pub doc: Document,
    /// Wall-clock milliseconds at which the record was added (expiring sets only)
    #[serde(rename = "addedAt", default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<i64>,
}

impl AddRecord {
    /// Create a record without an add timestamp
    pub fn new(id: impl Into<String>, doc: Document) -> Self {
        Self {
            id: id.into(),
            doc,
            added_at: None,
        }
    }

    /// Attach an add timestamp
    pub fn with_added_at(mut self, added_at: i64) -> Self {
        self.added_at = Some(added_at);
        self
    }
}

/// Full exportable/importable snapshot of a set.
///
/// `removals` maps a tombstoned id to itself. Both maps only grow, except
/// for garbage collection of expired entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetState {
    #[serde(default)]
    pub adds: HashMap<String, AddRecord>,
    #[serde(default)]
    pub removals: HashMap<String, String>,
}

impl SetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the id has been tombstoned
    pub fn is_removed(&self, id: &str) -> bool {
        self.removals.contains_key(id)
    }

    /// Ids that are added and not tombstoned
    pub fn live_ids(&self) -> BTreeSet<String> {
        self.adds
            .keys()
            .filter(|id| !self.is_removed(id))
            .cloned()
            .collect()
    }

    /// Number of live records
    pub fn live_count(&self) -> usize {
        self.adds.keys().filter(|id| !self.is_removed(id)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removals.is_empty()
    }
}
