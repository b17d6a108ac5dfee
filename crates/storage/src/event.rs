//! Events emitted by a table.
//!
//! Mutations return the event they produced instead of dispatching it, so
//! that the owner decides when dependents observe it. `TableBatch` merges a
//! burst of events into their net effect for coalesced delivery.

use alloc::vec::Vec;
use hashbrown::hash_map::DefaultHashBuilder;
use horizon_core::{Row, Value};
use horizon_reactive::{Coalesce, Event, UpdateReason};
use indexmap::{IndexMap, IndexSet};

/// Where a mutation came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Origin {
    /// Set when a replica re-applies a remote mutation, so the replication
    /// layer does not broadcast it again.
    pub replication_echo: bool,
}

impl Origin {
    /// A mutation made by this process.
    pub const fn local() -> Self {
        Self {
            replication_echo: false,
        }
    }

    /// A mutation re-applied from a remote replica.
    pub const fn replicated() -> Self {
        Self {
            replication_echo: true,
        }
    }
}

/// A change notification from a table.
#[derive(Clone, Debug, PartialEq)]
pub enum TableEvent {
    /// Rows were added or re-derived.
    DataUpdate {
        rows: Vec<Row>,
        replication_echo: bool,
        reason: UpdateReason,
    },
    /// Rows were tombstoned.
    DataRemove {
        ids: Vec<Value>,
        replication_echo: bool,
    },
    /// The table is going away.
    Destroy,
}

impl Event for TableEvent {
    fn name(&self) -> &'static str {
        match self {
            TableEvent::DataUpdate { .. } => "dataUpdate",
            TableEvent::DataRemove { .. } => "dataRemove",
            TableEvent::Destroy => "destroy",
        }
    }
}

impl TableEvent {
    /// Returns true if this event re-applies a remote mutation.
    pub fn is_replication_echo(&self) -> bool {
        match self {
            TableEvent::DataUpdate { replication_echo, .. } | TableEvent::DataRemove { replication_echo, .. } => {
                *replication_echo
            }
            TableEvent::Destroy => false,
        }
    }
}

/// Net effect of a run of data events from one table.
///
/// Rows and removed ids are keyed by identity, so folding in a later batch
/// costs O(1) per row however long the run gets.
#[derive(Clone, Debug, PartialEq)]
pub struct TableBatch {
    rows: IndexMap<Value, Row, DefaultHashBuilder>,
    removed: IndexSet<Value, DefaultHashBuilder>,
    reason: UpdateReason,
    replication_echo: bool,
}

impl TableBatch {
    /// Starts a batch from a data event. Returns None for `Destroy`.
    ///
    /// `id_index` is the offset of the identity column of the event's rows.
    pub fn from_event(event: TableEvent, id_index: usize) -> Option<Self> {
        match event {
            TableEvent::DataUpdate {
                rows,
                replication_echo,
                reason,
            } => Some(Self {
                rows: rows
                    .into_iter()
                    .map(|row| (row.get(id_index).cloned().unwrap_or_default(), row))
                    .collect(),
                removed: IndexSet::default(),
                reason,
                replication_echo,
            }),
            TableEvent::DataRemove { ids, replication_echo } => Some(Self {
                rows: IndexMap::default(),
                removed: ids.into_iter().collect(),
                reason: UpdateReason::Data,
                replication_echo,
            }),
            TableEvent::Destroy => None,
        }
    }

    /// Number of rows and removals pending.
    pub fn len(&self) -> usize {
        self.rows.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.removed.is_empty()
    }

    /// Splits the batch back into at most one update and one removal.
    pub fn into_events(self) -> Vec<TableEvent> {
        let mut events = Vec::with_capacity(2);
        if !self.rows.is_empty() || self.reason == UpdateReason::Reset {
            events.push(TableEvent::DataUpdate {
                rows: self.rows.into_values().collect(),
                replication_echo: self.replication_echo,
                reason: self.reason,
            });
        }
        if !self.removed.is_empty() {
            events.push(TableEvent::DataRemove {
                ids: self.removed.into_iter().collect(),
                replication_echo: self.replication_echo,
            });
        }
        events
    }
}

impl Coalesce for TableBatch {
    fn coalesce(&mut self, later: Self) {
        for (id, row) in later.rows {
            self.removed.swap_remove(&id);
            self.rows.insert(id, row);
        }
        for id in later.removed {
            self.rows.swap_remove(&id);
            self.removed.insert(id);
        }
        if self.reason != UpdateReason::Reset {
            self.reason = later.reason;
        }
        self.replication_echo &= later.replication_echo;
    }
}
