//! Column definition for the Horizon engine.
//!
//! A `ColumnDef` is the declarative unit of a schema. Besides naming and typing
//! a cell it says how the cell is derived: a default for absent input, an
//! overriding `value`, a compiled `expression`, or a cross-table `resolve`.

use super::callback::Callback;
use super::layout::Schema;
use crate::row::{Row, RowRef};
use crate::types::ColumnType;
use crate::value::Value;
use alloc::rc::Rc;
use alloc::string::String;
use serde::{Deserialize, Serialize};

/// Computed default: invoked with the row being derived.
pub type DefaultFn = dyn Fn(&RowRef<'_>) -> Value;

/// Computed value: invoked with `(row, incoming, previous, column_name)`.
pub type ValueFn = dyn Fn(&RowRef<'_>, &Value, &Value, &str) -> Value;

/// Custom aggregator.
pub type AggregateFn = dyn Fn(&AggregateContext<'_>) -> Value;

/// Arguments handed to a custom aggregator.
pub struct AggregateContext<'a> {
    /// Rows of the partition being summarized.
    pub rows: &'a [Row],
    /// Schema the rows are laid out by.
    pub schema: &'a Schema,
    /// Column being aggregated.
    pub column: &'a str,
    /// Group key of the current level, None at the root.
    pub group_key: Option<&'a str>,
    /// Hierarchical id of the partition (`east/books`).
    pub branch_path: &'a str,
    /// Summary row of the enclosing partition.
    pub parent: Option<&'a Row>,
}

/// Fills a cell whose stored value is absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// Rendered against the row (`"{{first}} {{last}}"`).
    Template { template: String },
    /// Literal.
    Static(Value),
    /// Function of the row.
    #[serde(skip_deserializing)]
    Computed(Callback<DefaultFn>),
}

/// Always overrides stored data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    /// Rendered against the row.
    Template { template: String },
    /// Literal.
    Static(Value),
    /// Function of `(row, incoming, previous, column_name)`.
    #[serde(skip_deserializing)]
    Computed(Callback<ValueFn>),
}

/// Summarization applied to a column when rows are grouped.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregator {
    Sum,
    Avg,
    Max,
    Min,
    /// Number of rows in the partition.
    Count,
    First,
    Last,
    /// Carried through only when every row agrees.
    #[default]
    None,
    #[serde(skip_deserializing)]
    Custom(Callback<AggregateFn>),
}

/// Cross-table join spec for a resolve column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSpec {
    /// Column of the row holding the foreign key.
    pub underlying_field: String,
    /// Child table looked up by primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_table: Option<String>,
    /// Live view looked up instead of a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Column of the child row to display.
    pub display_field: String,
    /// Rendered against the child row instead of `display_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_template: Option<String>,
}

impl ResolveSpec {
    /// Resolve against a child table.
    pub fn table(
        underlying_field: impl Into<String>,
        children_table: impl Into<String>,
        display_field: impl Into<String>,
    ) -> Self {
        Self {
            underlying_field: underlying_field.into(),
            children_table: Some(children_table.into()),
            session: None,
            display_field: display_field.into(),
            display_template: None,
        }
    }

    /// Resolve against a live view.
    pub fn session(
        underlying_field: impl Into<String>,
        session: impl Into<String>,
        display_field: impl Into<String>,
    ) -> Self {
        Self {
            underlying_field: underlying_field.into(),
            children_table: None,
            session: Some(session.into()),
            display_field: display_field.into(),
            display_template: None,
        }
    }

    /// Renders `template` against the child row instead of `display_field`.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.display_template = Some(template.into());
        self
    }

    /// Name of whatever this spec points at.
    pub fn target(&self) -> Option<&str> {
        self.session.as_deref().or(self.children_table.as_deref())
    }
}

/// A column definition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub secondary_key: bool,
    #[serde(default)]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ColumnValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<Aggregator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveSpec>,
}

impl ColumnDef {
    /// Creates a plain stored column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Marks this column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Maintains a secondary index on this column.
    pub fn secondary_key(mut self) -> Self {
        self.secondary_key = true;
        self
    }

    /// Sets the declared type.
    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Literal default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Template default.
    pub fn default_template(mut self, template: impl Into<String>) -> Self {
        self.default_value = Some(DefaultValue::Template {
            template: template.into(),
        });
        self
    }

    /// Computed default.
    pub fn default_with<F>(mut self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RowRef<'_>) -> Value + 'static,
    {
        let func: Rc<DefaultFn> = Rc::new(f);
        self.default_value = Some(DefaultValue::Computed(Callback::from_rc(label, func)));
        self
    }

    /// Literal value overriding any input.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(ColumnValue::Static(value.into()));
        self
    }

    /// Template value overriding any input.
    pub fn value_template(mut self, template: impl Into<String>) -> Self {
        self.value = Some(ColumnValue::Template {
            template: template.into(),
        });
        self
    }

    /// Computed value overriding any input.
    pub fn value_with<F>(mut self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RowRef<'_>, &Value, &Value, &str) -> Value + 'static,
    {
        let func: Rc<ValueFn> = Rc::new(f);
        self.value = Some(ColumnValue::Computed(Callback::from_rc(label, func)));
        self
    }

    /// Expression compiled once and evaluated per row.
    pub fn expression(mut self, text: impl Into<String>) -> Self {
        self.expression = Some(text.into());
        self
    }

    /// Aggregator used when rows are grouped.
    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Custom aggregator.
    pub fn aggregate_with<F>(mut self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&AggregateContext<'_>) -> Value + 'static,
    {
        let func: Rc<AggregateFn> = Rc::new(f);
        self.aggregator = Some(Aggregator::Custom(Callback::from_rc(label, func)));
        self
    }

    /// Cross-table resolve.
    pub fn resolve(mut self, spec: ResolveSpec) -> Self {
        self.resolve = Some(spec);
        self
    }

    /// Returns true if any of `value`, `expression` or `resolve` is set.
    pub fn is_derived(&self) -> bool {
        self.value.is_some() || self.expression.is_some() || self.resolve.is_some()
    }
}
