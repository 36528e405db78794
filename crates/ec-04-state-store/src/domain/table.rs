//! Generic typed table with ordered secondary keys and undo layers.
//!
//! ## Undo model
//!
//! Each open session is one [`UndoLayer`] per table, recording the first
//! touch of every row inside the session:
//!
//! - `new_ids`: rows created in this session (undo deletes them),
//! - `old_values`: pre-session images of rows modified in this session,
//! - `removed`: pre-session images of rows removed in this session.
//!
//! A row appears in at most one of the three sets. `squash` folds the top
//! layer into its parent so the pair behaves like one session; dropping the
//! bottom layer commits it.
//!
//! ## Determinism
//!
//! Rows sit in a `BTreeMap` ordered by primary id and the secondary index in
//! a `BTreeSet` of `(key, id)` pairs, so every iteration order is total and
//! ties resolve by primary id ascending.

use crate::domain::errors::StoreError;
use serde::Serialize;
use std::any::type_name;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::Bound;

/// A row type stored in a [`Table`].
pub trait StateObject: Clone {
    /// Primary key. Immutable for the life of the row.
    type Id: Ord + Clone + Debug;
    /// Secondary ordering key(s). Recomputed from the row on every write.
    type Key: Ord + Clone + Debug;

    fn id(&self) -> Self::Id;

    /// The row's current secondary keys; empty for unindexed tables.
    fn keys(&self) -> Vec<Self::Key> {
        Vec::new()
    }
}

#[derive(Clone, Debug)]
struct UndoLayer<T: StateObject> {
    new_ids: BTreeSet<T::Id>,
    old_values: BTreeMap<T::Id, T>,
    removed: BTreeMap<T::Id, T>,
}

impl<T: StateObject> UndoLayer<T> {
    fn new() -> Self {
        UndoLayer {
            new_ids: BTreeSet::new(),
            old_values: BTreeMap::new(),
            removed: BTreeMap::new(),
        }
    }
}

/// A typed table: ordered rows, one ordered secondary index, undo layers.
#[derive(Clone, Debug)]
pub struct Table<T: StateObject> {
    rows: BTreeMap<T::Id, T>,
    index: BTreeSet<(T::Key, T::Id)>,
    undo_stack: Vec<UndoLayer<T>>,
}

impl<T: StateObject> Default for Table<T> {
    fn default() -> Self {
        Table {
            rows: BTreeMap::new(),
            index: BTreeSet::new(),
            undo_stack: Vec::new(),
        }
    }
}

impl<T: StateObject> Table<T> {
    fn index_insert(index: &mut BTreeSet<(T::Key, T::Id)>, row: &T) {
        let id = row.id();
        for key in row.keys() {
            index.insert((key, id.clone()));
        }
    }

    fn index_remove(index: &mut BTreeSet<(T::Key, T::Id)>, row: &T) {
        let id = row.id();
        for key in row.keys() {
            index.remove(&(key, id.clone()));
        }
    }

    /// Insert a new row. Fails with `IndexConflict` if the id is taken.
    pub fn create(&mut self, row: T) -> Result<&T, StoreError> {
        let id = row.id();
        if self.rows.contains_key(&id) {
            return Err(StoreError::IndexConflict {
                type_name: type_name::<T>(),
                id: format!("{id:?}"),
            });
        }

        Self::index_insert(&mut self.index, &row);
        if let Some(layer) = self.undo_stack.last_mut() {
            // A row re-created after an in-session remove stays an
            // old-image restore target, not a fresh creation.
            if let Some(old) = layer.removed.remove(&id) {
                layer.old_values.insert(id.clone(), old);
            } else {
                layer.new_ids.insert(id.clone());
            }
        }
        self.rows.insert(id.clone(), row);
        Ok(self.rows.get(&id).expect("row was just inserted"))
    }

    /// Mutate a row in place. The primary id must not change.
    pub fn modify<F>(&mut self, id: &T::Id, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut T),
    {
        let row = self.rows.get_mut(id).ok_or_else(|| StoreError::ObjectNotFound {
            type_name: type_name::<T>(),
            id: format!("{id:?}"),
        })?;

        let old = row.clone();
        Self::index_remove(&mut self.index, &old);
        f(row);

        if row.id() != *id {
            // Restore and refuse: primary keys are immutable.
            *row = old;
            Self::index_insert(&mut self.index, row);
            return Err(StoreError::IndexConflict {
                type_name: type_name::<T>(),
                id: format!("{id:?}"),
            });
        }

        let row = self.rows.get(id).expect("row still present");
        Self::index_insert(&mut self.index, row);

        if let Some(layer) = self.undo_stack.last_mut() {
            if !layer.new_ids.contains(id) && !layer.old_values.contains_key(id) {
                layer.old_values.insert(id.clone(), old);
            }
        }
        Ok(())
    }

    /// Remove a row, returning its final value.
    pub fn remove(&mut self, id: &T::Id) -> Result<T, StoreError> {
        let row = self.rows.remove(id).ok_or_else(|| StoreError::ObjectNotFound {
            type_name: type_name::<T>(),
            id: format!("{id:?}"),
        })?;
        Self::index_remove(&mut self.index, &row);

        if let Some(layer) = self.undo_stack.last_mut() {
            if layer.new_ids.remove(id) {
                // Created and destroyed inside the session: no trace.
            } else if let Some(old) = layer.old_values.remove(id) {
                layer.removed.insert(id.clone(), old);
            } else {
                layer.removed.insert(id.clone(), row.clone());
            }
        }
        Ok(row)
    }

    pub fn find(&self, id: &T::Id) -> Option<&T> {
        self.rows.get(id)
    }

    pub fn get(&self, id: &T::Id) -> Result<&T, StoreError> {
        self.rows.get(id).ok_or_else(|| StoreError::ObjectNotFound {
            type_name: type_name::<T>(),
            id: format!("{id:?}"),
        })
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.rows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in primary-id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Ids in primary order; useful when the loop body mutates the table.
    pub fn ids(&self) -> Vec<T::Id> {
        self.rows.keys().cloned().collect()
    }

    /// Rows whose primary id lies in `range`, ascending.
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = &T>
    where
        R: std::ops::RangeBounds<T::Id>,
    {
        self.rows.range(range).map(|(_, v)| v)
    }

    /// The least `(key, id)` entry of the secondary index.
    pub fn first_by_key(&self) -> Option<&(T::Key, T::Id)> {
        self.index.iter().next()
    }

    /// Secondary index entries ascending from `lower` (inclusive).
    pub fn index_from<'a>(
        &'a self,
        lower: Bound<&(T::Key, T::Id)>,
    ) -> impl Iterator<Item = &'a (T::Key, T::Id)> {
        self.index.range((lower.cloned(), Bound::Unbounded))
    }

    /// All secondary index entries, ascending.
    pub fn index_iter(&self) -> impl Iterator<Item = &(T::Key, T::Id)> {
        self.index.iter()
    }

    // --- undo machinery -------------------------------------------------

    pub fn begin_undo(&mut self) {
        self.undo_stack.push(UndoLayer::new());
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Roll back the top session.
    pub fn undo(&mut self) {
        let layer = self.undo_stack.pop().expect("undo without session");

        for id in &layer.new_ids {
            let row = self.rows.remove(id).expect("created row must exist");
            Self::index_remove(&mut self.index, &row);
        }
        for (id, old) in layer.old_values {
            let row = self.rows.get_mut(&id).expect("modified row must exist");
            Self::index_remove(&mut self.index, row);
            *row = old;
            let row = self.rows.get(&id).expect("row still present");
            Self::index_insert(&mut self.index, row);
        }
        for (id, old) in layer.removed {
            Self::index_insert(&mut self.index, &old);
            self.rows.insert(id, old);
        }
    }

    /// Fold the top session into its parent.
    pub fn squash(&mut self) {
        let head = self.undo_stack.pop().expect("squash without session");
        let prev = self.undo_stack.last_mut().expect("squash without parent session");

        for (id, old) in head.old_values {
            if prev.new_ids.contains(&id) || prev.old_values.contains_key(&id) {
                continue;
            }
            debug_assert!(!prev.removed.contains_key(&id), "modified a removed row");
            prev.old_values.insert(id, old);
        }
        for id in head.new_ids {
            if let Some(old) = prev.removed.remove(&id) {
                prev.old_values.insert(id, old);
            } else {
                prev.new_ids.insert(id);
            }
        }
        for (id, old) in head.removed {
            if prev.new_ids.remove(&id) {
                // Created in the parent, removed in the child: cancels out.
            } else if let Some(parent_old) = prev.old_values.remove(&id) {
                prev.removed.insert(id, parent_old);
            } else {
                prev.removed.insert(id, old);
            }
        }
    }

    /// Discard the oldest session, making its effects permanent.
    pub fn commit_one(&mut self) {
        assert!(!self.undo_stack.is_empty(), "commit without session");
        self.undo_stack.remove(0);
    }

    /// Deterministic bytes of the row set, for state digests.
    pub fn rows_bytes(&self) -> Vec<u8>
    where
        T: Serialize,
        T::Id: Serialize,
    {
        bincode::serialize(&self.rows).expect("row serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
    struct Row {
        id: u32,
        value: i64,
        due: u32,
    }

    impl StateObject for Row {
        type Id = u32;
        type Key = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn keys(&self) -> Vec<u32> {
            vec![self.due]
        }
    }

    fn row(id: u32, value: i64, due: u32) -> Row {
        Row { id, value, due }
    }

    #[test]
    fn test_create_and_duplicate() {
        let mut t: Table<Row> = Table::default();
        t.create(row(1, 10, 5)).unwrap();
        let err = t.create(row(1, 99, 5)).unwrap_err();
        assert!(matches!(err, StoreError::IndexConflict { .. }));
    }

    #[test]
    fn test_secondary_index_tracks_modifications() {
        let mut t: Table<Row> = Table::default();
        t.create(row(1, 10, 50)).unwrap();
        t.create(row(2, 20, 30)).unwrap();
        assert_eq!(t.first_by_key().unwrap(), &(30, 2));

        t.modify(&2, |r| r.due = 90).unwrap();
        assert_eq!(t.first_by_key().unwrap(), &(50, 1));
    }

    #[test]
    fn test_undo_restores_all_three_kinds() {
        let mut t: Table<Row> = Table::default();
        t.create(row(1, 10, 5)).unwrap();
        t.create(row(2, 20, 6)).unwrap();

        t.begin_undo();
        t.create(row(3, 30, 7)).unwrap();
        t.modify(&1, |r| r.value = 99).unwrap();
        t.remove(&2).unwrap();
        t.undo();

        assert_eq!(t.find(&1).unwrap().value, 10);
        assert_eq!(t.find(&2).unwrap().value, 20);
        assert!(t.find(&3).is_none());
        // The index is restored too.
        assert_eq!(t.first_by_key().unwrap(), &(5, 1));
        assert_eq!(t.index_iter().count(), 2);
    }

    #[test]
    fn test_squash_merges_into_parent() {
        let mut t: Table<Row> = Table::default();
        t.create(row(1, 10, 5)).unwrap();

        t.begin_undo();
        t.modify(&1, |r| r.value = 20).unwrap();

        t.begin_undo();
        t.modify(&1, |r| r.value = 30).unwrap();
        t.create(row(2, 1, 1)).unwrap();
        t.squash();

        // Undoing the merged session drops both inner changes.
        t.undo();
        assert_eq!(t.find(&1).unwrap().value, 10);
        assert!(t.find(&2).is_none());
    }

    #[test]
    fn test_create_remove_within_session_leaves_no_trace() {
        let mut t: Table<Row> = Table::default();
        t.begin_undo();
        t.create(row(7, 1, 1)).unwrap();
        t.remove(&7).unwrap();
        t.undo();
        assert!(t.is_empty());
        assert_eq!(t.index_iter().count(), 0);
    }

    #[test]
    fn test_remove_then_recreate_restores_original_on_undo() {
        let mut t: Table<Row> = Table::default();
        t.create(row(1, 10, 5)).unwrap();

        t.begin_undo();
        t.remove(&1).unwrap();
        t.create(row(1, 999, 8)).unwrap();
        t.undo();

        assert_eq!(t.find(&1).unwrap().value, 10);
        assert_eq!(t.first_by_key().unwrap(), &(5, 1));
    }

    #[test]
    fn test_commit_discards_oldest_layer() {
        let mut t: Table<Row> = Table::default();
        t.begin_undo();
        t.create(row(1, 10, 5)).unwrap();
        t.begin_undo();
        t.create(row(2, 20, 6)).unwrap();

        t.commit_one();
        assert_eq!(t.undo_depth(), 1);
        // Undoing what remains only drops the newer creation.
        t.undo();
        assert!(t.contains(&1));
        assert!(!t.contains(&2));
    }

    #[test]
    fn test_modify_cannot_change_id() {
        let mut t: Table<Row> = Table::default();
        t.create(row(1, 10, 5)).unwrap();
        let err = t.modify(&1, |r| r.id = 2).unwrap_err();
        assert!(matches!(err, StoreError::IndexConflict { .. }));
        assert_eq!(t.find(&1).unwrap().value, 10);
        assert!(t.find(&2).is_none());
    }
}
