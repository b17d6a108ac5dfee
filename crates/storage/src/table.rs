//! Row storage for one table.
//!
//! A `Table` keeps its rows in insertion order. Removing a row only marks it
//! as a tombstone and drops it from every index; the slot is reclaimed by
//! the next compacting read, so bursts of removals stay linear. The identity
//! map and the secondary indexes only ever reference live rows.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use horizon_core::expr::ExpressionEngine;
use horizon_core::schema::{ColumnDef, Schema};
use horizon_core::{Error, Result, Row, RowInput, Value};
use horizon_index::{HashIndex, Index};
use horizon_reactive::{CoalesceConfig, EventBus, UpdateReason};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::derive::Derivation;
use crate::event::{Origin, TableEvent};
use crate::resolve::Resolve;

/// Replication and delivery hints for a table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    /// Mirrored to remote replicas by the replication layer.
    #[serde(default)]
    pub cluster_sync: bool,
    /// Kept by the replication layer's snapshot store.
    #[serde(default)]
    pub persistent: bool,
    /// Merges bursts of events before dependents see them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coalesce: Option<CoalesceConfig>,
}

/// Secondary indexes by column offset, mapping a cell value to row ids.
type SecondaryIndexes = HashMap<usize, HashIndex<Value, Value>>;

/// A named, indexed row store.
#[derive(Debug)]
pub struct Table {
    id: String,
    name: String,
    schema: Schema,
    options: TableOptions,
    derivation: Derivation,
    rows: Vec<Row>,
    rows_by_id: HashMap<Value, usize>,
    secondary: SecondaryIndexes,
    tombstones: usize,
    /// Ids of tombstoned rows still in storage.
    removed_ids: HashSet<Value>,
    next_seq: u64,
    events: EventBus<TableEvent>,
}

impl Table {
    /// Creates an empty table named `namespace.name`.
    pub fn new(
        namespace: &str,
        name: &str,
        columns: Vec<ColumnDef>,
        options: TableOptions,
        engine: Option<&dyn ExpressionEngine>,
    ) -> Result<Self> {
        let schema = Schema::new(columns)?;
        let derivation = Derivation::compile(&schema, engine)?;
        let secondary = schema
            .secondary_keys()
            .map(|offset| (offset, HashIndex::new(false)))
            .collect();

        Ok(Self {
            id: if namespace.is_empty() {
                name.into()
            } else {
                format!("{}.{}", namespace, name)
            },
            name: name.into(),
            schema,
            options,
            derivation,
            rows: Vec::new(),
            rows_by_id: HashMap::new(),
            secondary,
            tombstones: 0,
            removed_ids: HashSet::new(),
            next_seq: 0,
            events: EventBus::new(),
        })
    }

    /// Namespace-qualified id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name within the registry.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Listeners of this table.
    pub fn events(&self) -> &EventBus<TableEvent> {
        &self.events
    }

    /// Listeners of this table, for registration.
    pub fn events_mut(&mut self) -> &mut EventBus<TableEvent> {
        &mut self.events
    }

    /// Delivers `event` to this table's listeners.
    pub fn emit(&mut self, event: &TableEvent) -> usize {
        self.events.trigger(event)
    }

    /// Number of live rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows_by_id.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows_by_id.is_empty()
    }

    /// Number of tombstoned rows awaiting compaction.
    #[inline]
    pub fn tombstone_count(&self) -> usize {
        self.tombstones
    }

    fn row_id<'a>(&self, row: &'a Row) -> &'a Value {
        row.get(self.schema.id_index()).unwrap_or(&Value::Null)
    }

    fn index_row(secondary: &mut SecondaryIndexes, id: &Value, row: &Row) {
        for (offset, index) in secondary.iter_mut() {
            let key = row.get(*offset).cloned().unwrap_or_default();
            let _ = index.add(key, id.clone());
        }
    }

    fn unindex_row(secondary: &mut SecondaryIndexes, id: &Value, row: &Row) {
        for (offset, index) in secondary.iter_mut() {
            let key = row.get(*offset).cloned().unwrap_or_default();
            index.remove(&key, Some(id));
        }
    }

    fn reindex_row(secondary: &mut SecondaryIndexes, id: &Value, old: &Row, new: &Row) {
        for (offset, index) in secondary.iter_mut() {
            let old_key = old.get(*offset).cloned().unwrap_or_default();
            let new_key = new.get(*offset).cloned().unwrap_or_default();
            if old_key != new_key {
                index.relocate(&old_key, new_key, id.clone());
            }
        }
    }

    fn insert_row(&mut self, row: &mut Row) -> bool {
        let id = self.row_id(row).clone();
        if id.is_null() || self.rows_by_id.contains_key(&id) {
            return false;
        }
        self.next_seq += 1;
        row.set_seq(self.next_seq);
        Self::index_row(&mut self.secondary, &id, row);
        self.rows_by_id.insert(id, self.rows.len());
        self.rows.push(row.clone());
        true
    }

    fn data_update(rows: Vec<Row>, origin: Origin, reason: UpdateReason) -> TableEvent {
        TableEvent::DataUpdate {
            rows,
            replication_echo: origin.replication_echo,
            reason,
        }
    }

    /// Inserts the rows whose key is not present yet.
    ///
    /// Returns a `DataUpdate` carrying the accepted rows, or None if every
    /// row was rejected.
    pub fn add(&mut self, inputs: Vec<RowInput>, origin: Origin, resolver: &dyn Resolve) -> Option<TableEvent> {
        let mut accepted = Vec::new();
        for input in &inputs {
            if let Some(key) = input.key(&self.schema) {
                if self.rows_by_id.contains_key(&key) {
                    continue;
                }
            }
            let mut row = self.derivation.derive(&self.schema, input, None, resolver);
            if self.insert_row(&mut row) {
                accepted.push(row);
            }
        }

        if accepted.is_empty() {
            None
        } else {
            Some(Self::data_update(accepted, origin, UpdateReason::Data))
        }
    }

    /// Re-derives existing rows in place, merging the given fields. Inputs
    /// with an unknown key are added.
    pub fn update(&mut self, inputs: Vec<RowInput>, origin: Origin, resolver: &dyn Resolve) -> Option<TableEvent> {
        let mut changed = Vec::new();
        for input in &inputs {
            let slot = input.key(&self.schema).and_then(|k| self.rows_by_id.get(&k).copied());
            match slot {
                Some(slot) => {
                    let id = self.row_id(&self.rows[slot]).clone();
                    let mut row = self.derivation.derive(&self.schema, input, Some(&self.rows[slot]), resolver);
                    row.set(self.schema.id_index(), id.clone());
                    row.increment_version();
                    let old = core::mem::replace(&mut self.rows[slot], row.clone());
                    Self::reindex_row(&mut self.secondary, &id, &old, &row);
                    changed.push(row);
                }
                None => {
                    let mut row = self.derivation.derive(&self.schema, input, None, resolver);
                    if self.insert_row(&mut row) {
                        changed.push(row);
                    }
                }
            }
        }

        if changed.is_empty() {
            None
        } else {
            Some(Self::data_update(changed, origin, UpdateReason::Data))
        }
    }

    /// Tombstones the rows with the given ids. Unknown and already removed
    /// ids are skipped.
    pub fn remove(&mut self, ids: &[Value], origin: Origin) -> Option<TableEvent> {
        let mut removed = Vec::new();
        for id in ids {
            let Some(slot) = self.rows_by_id.remove(id) else {
                continue;
            };
            Self::unindex_row(&mut self.secondary, id, &self.rows[slot]);
            self.rows[slot].mark_removed();
            self.tombstones += 1;
            self.removed_ids.insert(id.clone());
            removed.push(id.clone());
        }

        if removed.is_empty() {
            None
        } else {
            Some(TableEvent::DataRemove {
                ids: removed,
                replication_echo: origin.replication_echo,
            })
        }
    }

    /// Replaces the contents of the table, or with `None` compacts it, and
    /// returns a `Reset` update carrying every live row.
    pub fn reset(&mut self, inputs: Option<Vec<RowInput>>, origin: Origin, resolver: &dyn Resolve) -> TableEvent {
        match inputs {
            Some(inputs) => {
                self.clear();
                for input in &inputs {
                    let mut row = self.derivation.derive(&self.schema, input, None, resolver);
                    self.insert_row(&mut row);
                }
            }
            None => self.compact(),
        }
        Self::data_update(self.rows.clone(), origin, UpdateReason::Reset)
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.rows_by_id.clear();
        self.tombstones = 0;
        self.removed_ids.clear();
        for index in self.secondary.values_mut() {
            index.clear();
        }
    }

    /// Drops tombstoned rows from storage.
    pub fn compact(&mut self) {
        if self.tombstones == 0 {
            return;
        }
        let before = self.rows.len();
        self.rows.retain(|r| !r.is_removed());
        self.rows_by_id.clear();
        let id_index = self.schema.id_index();
        for (slot, row) in self.rows.iter().enumerate() {
            let id = row.get(id_index).cloned().unwrap_or_default();
            self.rows_by_id.insert(id, slot);
        }
        self.tombstones = 0;
        self.removed_ids.clear();
        trace!(table = %self.id, reclaimed = before - self.rows.len(), "compacted");
    }

    /// Returns every live row, compacting first.
    pub fn get_all(&mut self) -> &[Row] {
        self.compact();
        &self.rows
    }

    /// Iterates over live rows without compacting.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| !r.is_removed())
    }

    /// Returns the live row with the given identity.
    pub fn get_by_id(&self, id: &Value) -> Option<&Row> {
        self.rows_by_id.get(id).map(|&slot| &self.rows[slot])
    }

    /// Returns true if the identity belongs to a removed row still in storage.
    pub fn is_tombstoned(&self, id: &Value) -> bool {
        !self.rows_by_id.contains_key(id) && self.removed_ids.contains(id)
    }

    /// Returns the live rows whose `column` equals `value`, through the
    /// column's secondary index.
    pub fn get_by_index(&self, column: &str, value: &Value) -> Result<Vec<&Row>> {
        let offset = self
            .schema
            .offset(column)
            .ok_or_else(|| Error::column_not_found(self.name.as_str(), column))?;
        let index = self
            .secondary
            .get(&offset)
            .ok_or_else(|| Error::invalid_operation(format!("column {} of {} is not indexed", column, self.name)))?;
        Ok(index
            .bucket(value)
            .filter_map(|id| self.get_by_id(id))
            .collect())
    }

    /// Ids filed under `value` in the secondary index of `column`.
    pub fn index_bucket(&self, column: &str, value: &Value) -> Vec<Value> {
        self.schema
            .offset(column)
            .and_then(|offset| self.secondary.get(&offset))
            .map(|index| index.get(value))
            .unwrap_or_default()
    }

    /// Replaces the column definitions, carrying existing rows over by
    /// column name, and returns a `ColumnsChanged` update.
    pub fn update_columns(
        &mut self,
        columns: Vec<ColumnDef>,
        engine: Option<&dyn ExpressionEngine>,
        resolver: &dyn Resolve,
    ) -> Result<TableEvent> {
        let schema = Schema::new(columns)?;
        let derivation = Derivation::compile(&schema, engine)?;

        let inputs: Vec<RowInput> = self
            .rows()
            .map(|row| {
                RowInput::Named(
                    self.schema
                        .columns()
                        .iter()
                        .zip(row.values())
                        .map(|(c, v)| (c.name.clone(), v.clone()))
                        .collect(),
                )
            })
            .collect();

        self.secondary = schema
            .secondary_keys()
            .map(|offset| (offset, HashIndex::new(false)))
            .collect();
        self.schema = schema;
        self.derivation = derivation;
        self.clear();
        for input in &inputs {
            let mut row = self.derivation.derive(&self.schema, input, None, resolver);
            self.insert_row(&mut row);
        }

        Ok(Self::data_update(self.rows.clone(), Origin::local(), UpdateReason::ColumnsChanged))
    }

    /// Re-derives every live row and returns a `Refresh` update carrying the
    /// rows whose values changed.
    ///
    /// Used when a table this one resolves against has changed. All rows are
    /// recomputed, not only those referencing the changed rows.
    pub fn refresh_derived(&mut self, resolver: &dyn Resolve) -> Option<TableEvent> {
        let empty = RowInput::Named(Default::default());
        let mut changed = Vec::new();
        for slot in 0..self.rows.len() {
            if self.rows[slot].is_removed() {
                continue;
            }
            let row = self.derivation.derive(&self.schema, &empty, Some(&self.rows[slot]), resolver);
            if row.values() == self.rows[slot].values() {
                continue;
            }
            let id = self.row_id(&self.rows[slot]).clone();
            let mut row = row;
            row.set(self.schema.id_index(), id.clone());
            row.increment_version();
            let old = core::mem::replace(&mut self.rows[slot], row.clone());
            Self::reindex_row(&mut self.secondary, &id, &old, &row);
            changed.push(row);
        }

        if changed.is_empty() {
            None
        } else {
            Some(Self::data_update(changed, Origin::local(), UpdateReason::Refresh))
        }
    }

    /// Delivers `Destroy` to the listeners, then detaches them.
    pub fn destroy(&mut self) {
        self.events.trigger(&TableEvent::Destroy);
        self.events.clear();
    }
}
