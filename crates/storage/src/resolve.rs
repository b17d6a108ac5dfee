//! Cross-table lookups for resolve columns.

use horizon_core::schema::ResolveSpec;
use horizon_core::{RowRef, Value};

/// Looks up the value of a resolve column.
///
/// Implementations never fail: a missing child table or row degrades to the
/// raw value of `underlying_field`, a tombstoned child row to Null.
pub trait Resolve {
    fn resolve(&self, spec: &ResolveSpec, row: &RowRef<'_>) -> Value;
}

/// Resolver for tables not bound to a registry. Every lookup falls back to
/// the underlying field.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unresolved;

impl Resolve for Unresolved {
    fn resolve(&self, spec: &ResolveSpec, row: &RowRef<'_>) -> Value {
        row.get(&spec.underlying_field).clone()
    }
}
