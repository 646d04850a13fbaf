//! Add/remove set with tombstones.

use uncorded_common::{AddRecord, Document, SetState};

use super::{ReplicatedSet, fresh_id};

/// In-memory CRDT set.
///
/// Live membership is `adds - removals`. A tombstoned id never becomes live
/// again, whatever adds are merged in later.
#[derive(Debug, Clone, Default)]
pub struct Set {
    state: SetState,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.state.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReplicatedSet for Set {
    fn add(&mut self, doc: &Document) -> AddRecord {
        let record = AddRecord::new(fresh_id(&self.state), doc.clone());
        self.state.adds.insert(record.id.clone(), record.clone());
        record
    }

    fn get(&mut self, id: &str) -> Option<AddRecord> {
        if self.state.is_removed(id) {
            return None;
        }
        self.state.adds.get(id).cloned()
    }

    fn remove(&mut self, id: &str) -> Option<AddRecord> {
        let record = self.get(id)?;
        self.state.removals.insert(id.to_string(), id.to_string());
        Some(record)
    }

    fn merge(&mut self, state: SetState) {
        // Ids are globally unique: a colliding id is the same logical record.
        for (id, record) in state.adds {
            self.state.adds.entry(id).or_insert(record);
        }
        self.state.removals.extend(state.removals);
    }

    fn state(&self) -> &SetState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn doc(n: u32) -> Document {
        json!({ "data": n })
    }

    #[test]
    fn test_add_returns_record_with_uuid() {
        let mut set = Set::new();
        let record = set.add(&doc(1));
        assert_eq!(record.id.len(), 36);
        assert_eq!(record.doc, doc(1));
        assert!(record.added_at.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut set = Set::new();
        let ids: HashSet<_> = (0..500).map(|n| set.add(&doc(n)).id).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_stores_a_copy_of_the_document() {
        let mut set = Set::new();
        let mut original = json!({ "foo": "bar" });
        let record = set.add(&original);

        original["foo"] = json!("changed");

        assert_eq!(set.get(&record.id).unwrap().doc, json!({ "foo": "bar" }));
    }

    #[test]
    fn test_remove() {
        let mut set = Set::new();
        let record = set.add(&doc(1));

        assert_eq!(set.remove(&record.id), Some(record.clone()));
        assert_eq!(set.get(&record.id), None);
        assert_eq!(set.remove(&record.id), None);
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_unknown_id_does_not_tombstone() {
        let mut set = Set::new();
        assert_eq!(set.remove("not-here"), None);
        assert!(set.state().removals.is_empty());
    }

    #[test]
    fn test_merge_adds() {
        let mut a = Set::new();
        let a1 = a.add(&doc(1));
        let mut b = Set::new();
        let b1 = b.add(&doc(2));

        a.merge(b.state().clone());

        assert_eq!(a.get(&a1.id).unwrap().doc, doc(1));
        assert_eq!(a.get(&b1.id).unwrap().doc, doc(2));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_merge_removals() {
        let mut a = Set::new();
        let a1 = a.add(&doc(1));

        let mut b = Set::new();
        b.merge(a.state().clone());
        b.remove(&a1.id);

        a.merge(b.state().clone());
        assert_eq!(a.get(&a1.id), None);
    }

    #[test]
    fn test_only_tombstone_items_already_in_set() {
        let mut a = Set::new();
        let a1 = a.add(&doc(1));

        let mut b = Set::new();
        assert_eq!(b.remove(&a1.id), None);

        a.merge(b.state().clone());
        assert_eq!(a.get(&a1.id), Some(a1));
    }

    #[test]
    fn test_merged_tombstone_for_unknown_id_is_recorded() {
        let mut a = Set::new();
        let mut incoming = SetState::new();
        incoming.removals.insert("ghost".into(), "ghost".into());

        a.merge(incoming);
        assert!(a.state().is_removed("ghost"));

        // A later add for the same id stays dead.
        let mut late = SetState::new();
        late.adds
            .insert("ghost".into(), AddRecord::new("ghost", doc(9)));
        a.merge(late);
        assert_eq!(a.get("ghost"), None);
    }

    #[test]
    fn test_merge_is_idempotent_and_commutative() {
        let mut a = Set::new();
        let mut b = Set::new();
        let mut c = Set::new();
        let a1 = a.add(&doc(1));
        a.add(&doc(2));
        b.add(&doc(3));
        b.merge(a.state().clone());
        b.remove(&a1.id);
        c.add(&doc(4));

        // (a ∪ b) ∪ c
        let mut left = a.clone();
        left.merge(b.state().clone());
        left.merge(c.state().clone());

        // a ∪ (b ∪ c)
        let mut bc = b.clone();
        bc.merge(c.state().clone());
        let mut right = a.clone();
        right.merge(bc.state().clone());

        // c ∪ b ∪ a, applied twice
        let mut reversed = c.clone();
        for _ in 0..2 {
            reversed.merge(b.state().clone());
            reversed.merge(a.state().clone());
        }

        assert_eq!(left.state(), right.state());
        assert_eq!(left.state(), reversed.state());
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn test_replicas_converge_after_bidirectional_exchange() {
        let mut a = Set::new();
        let mut b = Set::new();

        let shared = a.add(&doc(1));
        b.merge(a.state().clone());
        let only_b = b.add(&doc(2));
        a.remove(&shared.id);
        a.add(&doc(3));
        b.remove(&only_b.id);

        let from_a = a.state().clone();
        a.merge(b.state().clone());
        b.merge(from_a);

        assert_eq!(a.state().live_ids(), b.state().live_ids());
        assert_eq!(a.len(), 1);
    }
}
