//! Row structures for the Horizon engine.
//!
//! A stored `Row` is a fixed-layout vector of values ordered like its schema's
//! columns. `RowRef` pairs a row with its schema for name-based access, and
//! `RowInput` is the loosely shaped input accepted by table mutations.

use crate::schema::Schema;
use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

static NULL: Value = Value::Null;

/// A row stored in a table or a live view snapshot.
#[derive(Clone, Debug)]
pub struct Row {
    /// Values stored in this row, indexed by column offset.
    values: Vec<Value>,
    /// Incremented every time the row is re-derived.
    version: u64,
    /// Insertion sequence assigned by the owning table. Orders rows the way
    /// the table stores them.
    seq: u64,
    /// Tombstone flag. Tombstoned rows stay in storage until compaction.
    removed: bool,
}

impl Row {
    /// Creates a new live row with the given values.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            version: 1,
            seq: 0,
            removed: false,
        }
    }

    /// Creates a row of `len` nulls.
    pub fn empty(len: usize) -> Self {
        Self::new(alloc::vec![Value::Null; len])
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Returns true if the row has been tombstoned.
    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Marks the row as removed.
    #[inline]
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns a mutable reference to the values.
    #[inline]
    pub fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }

    /// Consumes the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given column offset.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Sets a value at the given column offset.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index < self.values.len() {
            self.values[index] = value;
            true
        } else {
            false
        }
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.removed == other.removed && self.values == other.values
    }
}

/// A row viewed through its schema, so callbacks can address cells by name.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    schema: &'a Schema,
    values: &'a [Value],
}

impl<'a> RowRef<'a> {
    /// Wraps raw values laid out according to `schema`.
    pub fn new(schema: &'a Schema, values: &'a [Value]) -> Self {
        Self { schema, values }
    }

    /// Returns the value of a named column, or Null when the column is unknown.
    pub fn get(&self, column: &str) -> &'a Value {
        self.schema
            .offset(column)
            .and_then(|i| self.values.get(i))
            .unwrap_or(&NULL)
    }

    /// Returns the row identity.
    pub fn id(&self) -> &'a Value {
        self.values.get(self.schema.id_index()).unwrap_or(&NULL)
    }

    /// Returns the schema this row is laid out by.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Returns the raw values.
    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

/// Input accepted by table mutations.
///
/// `Named` carries only the fields the caller specified, which lets `update`
/// preserve everything else. `Positional` is array-shaped input laid out like
/// the target schema, with the identity at the schema's `id_index`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowInput {
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl RowInput {
    /// Builds a named input from `(column, value)` pairs.
    pub fn named<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        RowInput::Named(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a positional input.
    pub fn positional(values: Vec<Value>) -> Self {
        RowInput::Positional(values)
    }

    /// Returns the identity of this input under `schema`.
    pub fn key(&self, schema: &Schema) -> Option<Value> {
        match self {
            RowInput::Positional(values) => values.get(schema.id_index()).cloned(),
            RowInput::Named(fields) => fields.get(schema.id_property()).cloned(),
        }
        .filter(|v| !v.is_null())
    }

    /// Returns the specified value for the column at `offset`, if any.
    pub fn field(&self, schema: &Schema, offset: usize) -> Option<&Value> {
        match self {
            RowInput::Positional(values) => values.get(offset),
            RowInput::Named(fields) => schema
                .column(offset)
                .and_then(|c| fields.get(c.name.as_str())),
        }
    }
}

impl From<Row> for RowInput {
    fn from(row: Row) -> Self {
        RowInput::Positional(row.into_values())
    }
}
