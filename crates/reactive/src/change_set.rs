//! Change sets emitted by live views.
//!
//! A `ViewChange` is the difference between two states of a view: rows that
//! entered it, rows that stayed but changed, and rows that left it. Ids and
//! rows are kept in parallel vectors in the order they were recorded; a merge
//! that drops an entry moves the last entry of that list into its place.
//!
//! Build change sets through `add`, `update`, `remove` and `merge`. They keep
//! a private id index so merging a long burst stays linear.

use alloc::vec::Vec;
use hashbrown::HashMap;
use horizon_core::{Row, Value};
use serde::{Deserialize, Serialize};

/// Why a change set was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateReason {
    /// Ordinary row mutation.
    #[default]
    Data,
    /// The source replaced its contents; dependents rebuild instead of diffing.
    Reset,
    /// The source layout changed.
    ColumnsChanged,
    /// The view's own filter changed.
    Filter,
    /// Derived columns were recomputed after a dependency changed.
    Refresh,
}

/// Slot of each id in one of the id lists.
#[derive(Clone, Debug, Default)]
struct Positions {
    slots: HashMap<Value, usize>,
    /// Length of the list when `slots` last matched it.
    indexed: usize,
}

impl Positions {
    fn sync(&mut self, ids: &[Value]) {
        if self.indexed == ids.len() {
            return;
        }
        self.slots = ids.iter().enumerate().map(|(slot, id)| (id.clone(), slot)).collect();
        self.indexed = ids.len();
    }

    fn get(&self, id: &Value) -> Option<usize> {
        self.slots.get(id).copied()
    }

    fn contains(&self, id: &Value) -> bool {
        self.slots.contains_key(id)
    }

    fn push(&mut self, ids: &mut Vec<Value>, rows: &mut Vec<Row>, id: Value, row: Row) {
        if self.indexed == ids.len() {
            self.slots.insert(id.clone(), ids.len());
            self.indexed += 1;
        }
        ids.push(id);
        rows.push(row);
    }

    fn take(&mut self, ids: &mut Vec<Value>, rows: &mut Vec<Row>, id: &Value) -> Option<Row> {
        let slot = self.slots.remove(id)?;
        ids.swap_remove(slot);
        let row = rows.swap_remove(slot);
        if let Some(moved) = ids.get(slot) {
            self.slots.insert(moved.clone(), slot);
        }
        self.indexed -= 1;
        Some(row)
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.indexed = 0;
    }
}

/// A set of changes to a view's contents.
#[derive(Clone, Debug, Default)]
pub struct ViewChange {
    pub added_ids: Vec<Value>,
    pub added_rows: Vec<Row>,
    pub updated_ids: Vec<Value>,
    pub updated_rows: Vec<Row>,
    pub removed_ids: Vec<Value>,
    pub removed_rows: Vec<Row>,
    pub update_reason: UpdateReason,
    added: Positions,
    updated: Positions,
    removed: Positions,
}

impl PartialEq for ViewChange {
    fn eq(&self, other: &Self) -> bool {
        self.added_ids == other.added_ids
            && self.added_rows == other.added_rows
            && self.updated_ids == other.updated_ids
            && self.updated_rows == other.updated_rows
            && self.removed_ids == other.removed_ids
            && self.removed_rows == other.removed_rows
            && self.update_reason == other.update_reason
    }
}

impl ViewChange {
    /// Creates an empty change set.
    pub fn new(update_reason: UpdateReason) -> Self {
        Self {
            update_reason,
            ..Self::default()
        }
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added_ids.is_empty() && self.updated_ids.is_empty() && self.removed_ids.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added_ids.len() + self.updated_ids.len() + self.removed_ids.len()
    }

    /// Records a row that entered the view.
    #[inline]
    pub fn add(&mut self, id: Value, row: Row) {
        self.added.push(&mut self.added_ids, &mut self.added_rows, id, row);
    }

    /// Records a row that stayed in the view with new contents.
    #[inline]
    pub fn update(&mut self, id: Value, row: Row) {
        self.updated.push(&mut self.updated_ids, &mut self.updated_rows, id, row);
    }

    /// Records a row that left the view, carrying its last contents.
    #[inline]
    pub fn remove(&mut self, id: Value, row: Row) {
        self.removed.push(&mut self.removed_ids, &mut self.removed_rows, id, row);
    }

    /// Merges a later change set into this one, keeping only the net effect.
    ///
    /// A row added then removed disappears, a row removed then added becomes
    /// an update, and repeated updates keep the latest contents. `Reset`
    /// dominates any other reason; otherwise the later reason wins.
    pub fn merge(&mut self, later: ViewChange) {
        if self.update_reason != UpdateReason::Reset {
            self.update_reason = later.update_reason;
        }
        self.added.sync(&self.added_ids);
        self.updated.sync(&self.updated_ids);
        self.removed.sync(&self.removed_ids);

        for (id, row) in later.added_ids.into_iter().zip(later.added_rows) {
            if self
                .removed
                .take(&mut self.removed_ids, &mut self.removed_rows, &id)
                .is_some()
            {
                self.upsert_updated(id, row);
            } else if let Some(i) = self.added.get(&id) {
                self.added_rows[i] = row;
            } else {
                self.add(id, row);
            }
        }

        for (id, row) in later.updated_ids.into_iter().zip(later.updated_rows) {
            match self.added.get(&id) {
                Some(i) => self.added_rows[i] = row,
                None => self.upsert_updated(id, row),
            }
        }

        for (id, row) in later.removed_ids.into_iter().zip(later.removed_rows) {
            if self.added.take(&mut self.added_ids, &mut self.added_rows, &id).is_some() {
                continue;
            }
            self.updated.take(&mut self.updated_ids, &mut self.updated_rows, &id);
            if !self.removed.contains(&id) {
                self.remove(id, row);
            }
        }
    }

    fn upsert_updated(&mut self, id: Value, row: Row) {
        match self.updated.get(&id) {
            Some(i) => self.updated_rows[i] = row,
            None => self.update(id, row),
        }
    }

    /// Clears all changes, keeping the reason.
    pub fn clear(&mut self) {
        self.added_ids.clear();
        self.added_rows.clear();
        self.updated_ids.clear();
        self.updated_rows.clear();
        self.removed_ids.clear();
        self.removed_rows.clear();
        self.added.clear();
        self.updated.clear();
        self.removed.clear();
    }
}
