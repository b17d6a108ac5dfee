//! Horizon Core - Core types and column definitions for the Horizon engine.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - `Value`: Runtime values stored in a row cell
//! - `ColumnType`: Declared column types with input coercion
//! - `Row` / `RowRef` / `RowInput`: Fixed-layout rows, name-addressed views of
//!   rows, and the loosely shaped input accepted by table mutations
//! - `schema`: Declarative column definitions and the compiled `Schema` layout
//! - `expr`: The contract of the external expression engine
//! - `Error`: Error types for configuration failures
//!
//! # Example
//!
//! ```rust
//! use horizon_core::{RowInput, Value};
//! use horizon_core::schema::{ColumnDef, Schema};
//!
//! let schema = Schema::new(vec![
//!     ColumnDef::new("id").primary_key(),
//!     ColumnDef::new("name"),
//! ])
//! .unwrap();
//!
//! let input = RowInput::named([("id", Value::from(1i64)), ("name", "Alice".into())]);
//! assert_eq!(input.key(&schema), Some(Value::Int64(1)));
//! assert_eq!(schema.id_property(), "id");
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod expr;
mod row;
pub mod schema;
pub mod text;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::{Row, RowInput, RowRef};
pub use types::ColumnType;
pub use value::Value;
