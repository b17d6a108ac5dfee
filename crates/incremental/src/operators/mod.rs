//! Row operators shared by tables and live views.
//!
//! - Filter: compiled conjunction of field, expression and custom predicates
//! - Sort: compiled lexicographic ordering
//! - Aggregate: hierarchical grouping and per-partition summaries

mod aggregate;
mod filter;
mod sort;

pub use aggregate::{group_data, group_selected_data, summarize, GroupNode, Grouping, SummaryContext};
pub use filter::{Comparison, Filter, FilterChain, PredicateFn};
pub use sort::{CompareFn, Direction, SortOrder, SortSpec};
