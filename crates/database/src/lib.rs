//! Horizon Database - The registry of tables and live views.
//!
//! This crate ties the lower layers into an embeddable engine:
//!
//! - `Registry`: Owns every table and live view, routes table events to the
//!   views reading them, materializes views into tables and keeps resolve
//!   columns current
//! - `LiveView`: A filtered, sorted and optionally grouped view maintained
//!   incrementally from its source table
//! - `config`: Serde-backed declarations of tables, views and registry
//!   settings
//! - `DependencyGraph`: The edges between tables and views, used to reject
//!   cycles and to find what a change must refresh
//!
//! Time never advances on its own. Coalesced work is released when the host
//! calls `Registry::run_pending` with a `Clock` that has moved past the
//! deadline, or `Registry::flush`.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use horizon_core::schema::ColumnDef;
//! use horizon_core::{RowInput, Value};
//! use horizon_database::{DataRequest, Registry, RegistryConfig, SessionConfig};
//! use horizon_incremental::Filter;
//! use horizon_reactive::ManualClock;
//! use horizon_storage::TableOptions;
//!
//! let mut registry = Registry::new(RegistryConfig::default(), Rc::new(ManualClock::new()));
//! registry
//!     .create_table(
//!         "users",
//!         vec![ColumnDef::new("id").primary_key(), ColumnDef::new("status")],
//!         TableOptions::default(),
//!     )
//!     .unwrap();
//! registry
//!     .add(
//!         "users",
//!         vec![
//!             RowInput::named([("id", Value::from(1i64)), ("status", "active".into())]),
//!             RowInput::named([("id", Value::from(2i64)), ("status", "inactive".into())]),
//!         ],
//!     )
//!     .unwrap();
//!
//! let config = SessionConfig::new("users")
//!     .id("active")
//!     .permanent_filter(vec![Filter::eq("status", "active")]);
//! registry.create_session(config, false).unwrap();
//!
//! let rows = registry.get_data("active", &DataRequest::default()).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].get(0), Some(&Value::Int64(1)));
//! ```

#![no_std]

extern crate alloc;

pub mod config;
pub mod graph;
pub mod live_view;
pub mod registry;

pub use config::{DataRequest, RegistryConfig, SessionConfig, TableRef, TableSpec};
pub use graph::{DependencyGraph, EdgeKind, Node};
pub use live_view::{LiveView, ViewEvent};
pub use registry::{Mutation, Registry, SessionId, TableId};
