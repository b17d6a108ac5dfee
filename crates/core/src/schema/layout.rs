//! Compiled row layout.
//!
//! A `Schema` is built once from a column list and fixes the position of every
//! column inside a `Row`. Name lookups go through a precomputed offset map.

use super::column::ColumnDef;
use crate::error::{Error, Result};
use crate::row::RowRef;
use crate::value::Value;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Fixed layout of the rows of one table or view.
#[derive(Clone, Debug)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    offsets: HashMap<String, usize>,
    id_index: usize,
}

impl Schema {
    /// Builds a layout from column definitions.
    ///
    /// The identity column is the one flagged `primary_key`, or the first
    /// column when none is flagged.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        let mut pk = None;
        for (i, col) in columns.iter().enumerate() {
            if col.primary_key {
                if let Some(prev) = pk {
                    let prev: &ColumnDef = &columns[prev];
                    return Err(Error::invalid_schema(format!(
                        "multiple primary keys: {} and {}",
                        prev.name, col.name
                    )));
                }
                pk = Some(i);
            }
        }
        Self::with_id_index(columns, pk.unwrap_or(0))
    }

    /// Builds a layout whose identity is the named column, whatever the
    /// `primary_key` flags say. Used for grouped views keyed by a group key.
    pub fn with_id_property(columns: Vec<ColumnDef>, id_property: &str) -> Result<Self> {
        let index = columns
            .iter()
            .position(|c| c.name == id_property)
            .ok_or_else(|| Error::invalid_schema(format!("identity column {} is not defined", id_property)))?;
        Self::with_id_index(columns, index)
    }

    fn with_id_index(columns: Vec<ColumnDef>, id_index: usize) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_schema("a schema needs at least one column"));
        }

        let mut offsets = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(Error::invalid_schema(format!("column {} has no name", i)));
            }
            if offsets.insert(col.name.clone(), i).is_some() {
                return Err(Error::invalid_schema(format!("duplicate column: {}", col.name)));
            }
        }

        Ok(Self {
            columns,
            offsets,
            id_index,
        })
    }

    /// Returns the columns in layout order.
    #[inline]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Returns the column at `offset`.
    pub fn column(&self, offset: usize) -> Option<&ColumnDef> {
        self.columns.get(offset)
    }

    /// Returns the offset of a named column.
    #[inline]
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// Returns the named column.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.offset(name).map(|i| &self.columns[i])
    }

    /// Offset of the identity column.
    #[inline]
    pub fn id_index(&self) -> usize {
        self.id_index
    }

    /// Name of the identity column.
    pub fn id_property(&self) -> &str {
        &self.columns[self.id_index].name
    }

    /// Number of columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; a schema has at least one column.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Offsets of the columns carrying a secondary index.
    pub fn secondary_keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.secondary_key)
            .map(|(i, _)| i)
    }

    /// Views raw values through this schema.
    pub fn row_ref<'a>(&'a self, values: &'a [Value]) -> RowRef<'a> {
        RowRef::new(self, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_schema_offsets() {
        let schema = Schema::new(vec![
            ColumnDef::new("name"),
            ColumnDef::new("id").primary_key(),
            ColumnDef::new("status").secondary_key(),
        ])
        .unwrap();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.offset("status"), Some(2));
        assert_eq!(schema.offset("missing"), None);
        assert_eq!(schema.id_index(), 1);
        assert_eq!(schema.id_property(), "id");
        assert_eq!(schema.secondary_keys().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_schema_defaults_identity_to_first_column() {
        let schema = Schema::new(vec![ColumnDef::new("code"), ColumnDef::new("label")]).unwrap();
        assert_eq!(schema.id_property(), "code");
    }

    #[test]
    fn test_schema_with_id_property() {
        let schema =
            Schema::with_id_property(vec![ColumnDef::new("id").primary_key(), ColumnDef::new("region")], "region")
                .unwrap();
        assert_eq!(schema.id_property(), "region");
        assert!(Schema::with_id_property(vec![ColumnDef::new("id")], "nope").is_err());
    }

    #[test]
    fn test_schema_rejects_bad_definitions() {
        assert!(Schema::new(vec![]).is_err());
        assert!(Schema::new(vec![ColumnDef::new("a"), ColumnDef::new("a")]).is_err());
        assert!(Schema::new(vec![
            ColumnDef::new("a").primary_key(),
            ColumnDef::new("b").primary_key()
        ])
        .is_err());
    }
}
