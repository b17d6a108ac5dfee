//! Schema module for the Horizon engine.
//!
//! Declarative column definitions (`ColumnDef`) and the compiled `Schema`
//! layout built from them once per table or view.

mod callback;
mod column;
mod layout;

pub use callback::Callback;
pub use column::{
    AggregateContext, AggregateFn, Aggregator, ColumnDef, ColumnValue, DefaultFn, DefaultValue,
    ResolveSpec, ValueFn,
};
pub use layout::Schema;
