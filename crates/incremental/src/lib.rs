//! Horizon Incremental - Filtering, ordering and grouping of rows.
//!
//! Live views keep a private snapshot of their source and maintain it row by
//! row. This crate provides the operators they apply to each row:
//!
//! - `FilterChain`: `Filter` declarations compiled to column offsets
//! - `SortOrder`: `SortSpec` declarations compiled to a comparator
//! - `group_data` / `group_selected_data`: hash-partitioned grouping with
//!   per-column aggregators and hierarchical group ids
//!
//! # Example
//!
//! ```rust
//! use horizon_core::schema::{Aggregator, ColumnDef, Schema};
//! use horizon_core::{Row, Value};
//! use horizon_incremental::{group_data, Filter, FilterChain};
//!
//! let schema = Schema::new(vec![
//!     ColumnDef::new("id").primary_key(),
//!     ColumnDef::new("region"),
//!     ColumnDef::new("amount").aggregator(Aggregator::Sum),
//! ])
//! .unwrap();
//! let rows = vec![
//!     Row::new(vec![Value::from(1i64), Value::from("east"), Value::from(10i64)]),
//!     Row::new(vec![Value::from(2i64), Value::from("east"), Value::from(5i64)]),
//! ];
//!
//! let east = FilterChain::compile(&[Filter::eq("region", "east")], &schema, None).unwrap();
//! assert!(rows.iter().all(|r| east.matches(&schema.row_ref(r.values()))));
//!
//! let grouping = group_data(&schema, &rows, &["region".into()], false).unwrap();
//! assert_eq!(grouping.groups()[0].summary.get(2), Some(&Value::from(15i64)));
//! ```

#![no_std]

extern crate alloc;

pub mod operators;

pub use operators::{
    group_data, group_selected_data, summarize, CompareFn, Comparison, Direction, Filter, FilterChain,
    GroupNode, Grouping, PredicateFn, SortOrder, SortSpec, SummaryContext,
};
