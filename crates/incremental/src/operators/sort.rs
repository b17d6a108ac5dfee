//! Row ordering.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use horizon_core::schema::{Callback, Schema};
use horizon_core::{Error, Result, Row, RowRef};
use serde::{Deserialize, Serialize};

/// Custom comparator over two rows.
pub type CompareFn = dyn Fn(&RowRef<'_>, &RowRef<'_>) -> Ordering;

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    Field {
        field: String,
        #[serde(default)]
        direction: Direction,
    },
    #[serde(skip_deserializing)]
    Custom(Callback<CompareFn>),
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        SortSpec::Field {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortSpec::Field {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Orders rows with a user comparator.
    pub fn custom<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RowRef<'_>, &RowRef<'_>) -> Ordering + 'static,
    {
        let func: Rc<CompareFn> = Rc::new(f);
        SortSpec::Custom(Callback::from_rc(label, func))
    }
}

enum SortKey {
    Field { offset: usize, desc: bool },
    Custom(Callback<CompareFn>),
}

/// A compiled lexicographic ordering.
#[derive(Default)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl core::fmt::Debug for SortOrder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SortOrder").field("keys", &self.keys.len()).finish()
    }
}

impl SortOrder {
    /// Compiles `specs` against `schema`. Unknown or empty field names fail
    /// with `InvalidSort`.
    pub fn compile(specs: &[SortSpec], schema: &Schema) -> Result<Self> {
        let mut keys = Vec::with_capacity(specs.len());
        for spec in specs {
            keys.push(match spec {
                SortSpec::Field { field, .. } if field.is_empty() => {
                    return Err(Error::invalid_sort("", "no field or comparator given"));
                }
                SortSpec::Field { field, direction } => SortKey::Field {
                    offset: schema
                        .offset(field)
                        .ok_or_else(|| Error::invalid_sort(field.as_str(), "no such column"))?,
                    desc: *direction == Direction::Desc,
                },
                SortSpec::Custom(f) => SortKey::Custom(f.clone()),
            });
        }
        Ok(Self { keys })
    }

    /// Returns true if this ordering keeps the input order.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compares two rows laid out by `schema`.
    pub fn compare(&self, schema: &Schema, a: &Row, b: &Row) -> Ordering {
        for key in &self.keys {
            let ord = match key {
                SortKey::Field { offset, desc } => {
                    let ord = a.get(*offset).cmp(&b.get(*offset));
                    if *desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                SortKey::Custom(f) => (**f)(&schema.row_ref(a.values()), &schema.row_ref(b.values())),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Sorts `rows` in place. Ties keep their relative order.
    pub fn sort(&self, schema: &Schema, rows: &mut [Row]) {
        if !self.keys.is_empty() {
            rows.sort_by(|a, b| self.compare(schema, a, b));
        }
    }
}
