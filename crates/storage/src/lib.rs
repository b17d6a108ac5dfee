//! Horizon Storage - Indexed row storage for the Horizon engine.
//!
//! This crate provides the table layer:
//!
//! - `Table`: Row storage with an identity map, secondary hash indexes and
//!   tombstones reclaimed by compacting reads
//! - `Derivation`: The per-column pipeline building stored rows from input
//!   (copy, default, value, expression, resolve)
//! - `TableEvent` / `TableBatch`: Change notifications and their coalesced
//!   net effect
//! - `Resolve`: The lookup contract for resolve columns
//!
//! # Example
//!
//! ```rust
//! use horizon_core::schema::ColumnDef;
//! use horizon_core::{RowInput, Value};
//! use horizon_storage::{Origin, Table, TableOptions, Unresolved};
//!
//! let mut table = Table::new(
//!     "app",
//!     "users",
//!     vec![ColumnDef::new("id").primary_key(), ColumnDef::new("status").secondary_key()],
//!     TableOptions::default(),
//!     None,
//! )
//! .unwrap();
//!
//! let rows = vec![
//!     RowInput::named([("id", Value::from(1i64)), ("status", "active".into())]),
//!     RowInput::named([("id", Value::from(2i64)), ("status", "inactive".into())]),
//! ];
//! let event = table.add(rows, Origin::local(), &Unresolved);
//!
//! assert!(event.is_some());
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.get_by_index("status", &Value::from("active")).unwrap().len(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod derive;
pub mod event;
pub mod resolve;
pub mod table;

pub use derive::Derivation;
pub use event::{Origin, TableBatch, TableEvent};
pub use resolve::{Resolve, Unresolved};
pub use table::{Table, TableOptions};
