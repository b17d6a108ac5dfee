//! Row filters.
//!
//! Filters are declared as data (`Filter`) and compiled against a schema into
//! a `FilterChain` of offset-based predicates. A row passes the chain only if
//! it passes every predicate, so concatenating two filter lists is their
//! conjunction.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use horizon_core::expr::{Expression, ExpressionEngine};
use horizon_core::schema::{Callback, Schema};
use horizon_core::text::like;
use horizon_core::{Error, Result, RowRef, Value};
use serde::{Deserialize, Serialize};

/// Custom predicate over a row.
pub type PredicateFn = dyn Fn(&RowRef<'_>) -> bool;

/// Comparison applied by a field filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    #[default]
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Cell equals one of `values`.
    In,
    NotIn,
    /// SQL LIKE against the rendered cell.
    Like,
    IsNull,
    NotNull,
}

/// One declared filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    /// Compares one column against a literal.
    Field {
        field: String,
        #[serde(default)]
        comparison: Comparison,
        #[serde(default)]
        value: Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<Value>,
    },
    /// Truthiness of an expression evaluated by the configured engine.
    Expression { expression: String },
    /// Arbitrary predicate.
    #[serde(skip_deserializing)]
    Custom(Callback<PredicateFn>),
}

impl Filter {
    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// `field <comparison> value`.
    pub fn compare(field: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        Filter::Field {
            field: field.into(),
            comparison,
            value: value.into(),
            values: Vec::new(),
        }
    }

    /// `field IN values`.
    pub fn one_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::Field {
            field: field.into(),
            comparison: Comparison::In,
            value: Value::Null,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter by expression text.
    pub fn expression(text: impl Into<String>) -> Self {
        Filter::Expression {
            expression: text.into(),
        }
    }

    /// Filter by a user predicate.
    pub fn custom<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RowRef<'_>) -> bool + 'static,
    {
        let func: Rc<PredicateFn> = Rc::new(f);
        Filter::Custom(Callback::from_rc(label, func))
    }
}

enum Predicate {
    Compare {
        offset: usize,
        comparison: Comparison,
        value: Value,
        values: Vec<Value>,
    },
    Expression(Rc<dyn Expression>),
    Custom(Callback<PredicateFn>),
}

impl Predicate {
    fn test(&self, row: &RowRef<'_>) -> bool {
        match self {
            Predicate::Compare {
                offset,
                comparison,
                value,
                values,
            } => {
                let cell = row.values().get(*offset).unwrap_or(&Value::Null);
                compare(cell, *comparison, value, values)
            }
            Predicate::Expression(expr) => expr.evaluate(row).is_truthy(),
            Predicate::Custom(f) => (**f)(row),
        }
    }
}

fn same(a: &Value, b: &Value) -> bool {
    a.cmp(b) == Ordering::Equal
}

fn compare(cell: &Value, comparison: Comparison, value: &Value, values: &[Value]) -> bool {
    match comparison {
        Comparison::Eq => same(cell, value),
        Comparison::NotEq => !same(cell, value),
        Comparison::IsNull => cell.is_null(),
        Comparison::NotNull => !cell.is_null(),
        Comparison::In => values.iter().any(|v| same(cell, v)),
        Comparison::NotIn => !values.iter().any(|v| same(cell, v)),
        Comparison::Like => match (cell, value.as_str()) {
            (Value::Null, _) | (_, None) => false,
            (Value::String(s), Some(pattern)) => like(s, pattern),
            (other, Some(pattern)) => like(&other.to_string(), pattern),
        },
        // Ordering comparisons never match a null cell.
        _ if cell.is_null() || value.is_null() => false,
        Comparison::Lt => cell < value,
        Comparison::Lte => cell <= value,
        Comparison::Gt => cell > value,
        Comparison::Gte => cell >= value,
    }
}

/// A compiled conjunction of filters.
#[derive(Default)]
pub struct FilterChain {
    predicates: Vec<Predicate>,
}

impl core::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FilterChain")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

impl FilterChain {
    /// Compiles `filters` against `schema`.
    ///
    /// Unknown columns fail with `ColumnNotFound`. Expression filters need
    /// an engine and fail with `Expression` when none is given.
    pub fn compile(
        filters: &[Filter],
        schema: &Schema,
        engine: Option<&dyn ExpressionEngine>,
    ) -> Result<Self> {
        let mut predicates = Vec::with_capacity(filters.len());
        for filter in filters {
            let predicate = match filter {
                Filter::Field {
                    field,
                    comparison,
                    value,
                    values,
                } => Predicate::Compare {
                    offset: schema
                        .offset(field)
                        .ok_or_else(|| Error::column_not_found("filter", field.as_str()))?,
                    comparison: *comparison,
                    value: value.clone(),
                    values: values.clone(),
                },
                Filter::Expression { expression } => {
                    let engine = engine.ok_or_else(|| {
                        Error::expression(expression.as_str(), "no expression engine configured")
                    })?;
                    Predicate::Expression(engine.compile(expression)?)
                }
                Filter::Custom(f) => Predicate::Custom(f.clone()),
            };
            predicates.push(predicate);
        }
        Ok(Self { predicates })
    }

    /// Returns true if the row passes every predicate.
    pub fn matches(&self, row: &RowRef<'_>) -> bool {
        self.predicates.iter().all(|p| p.test(row))
    }

    /// Number of predicates.
    #[inline]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Returns true if every row passes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use horizon_core::schema::ColumnDef;

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDef::new("id").primary_key(),
            ColumnDef::new("status"),
            ColumnDef::new("age"),
        ])
        .unwrap()
    }

    fn passes(filters: &[Filter], values: &[Value]) -> bool {
        let schema = schema();
        let chain = FilterChain::compile(filters, &schema, None).unwrap();
        chain.matches(&schema.row_ref(values))
    }

    fn row(id: i64, status: &str, age: Value) -> Vec<Value> {
        vec![Value::Int64(id), Value::from(status), age]
    }

    #[test]
    fn test_filter_eq_and_conjunction() {
        let r = row(1, "active", Value::Int64(30));
        assert!(passes(&[Filter::eq("status", "active")], &r));
        assert!(!passes(&[Filter::eq("status", "inactive")], &r));
        assert!(!passes(
            &[
                Filter::eq("status", "active"),
                Filter::compare("age", Comparison::Gt, 40i64)
            ],
            &r
        ));
        assert!(passes(&[], &r));
    }

    #[test]
    fn test_filter_numeric_cross_type() {
        let r = row(1, "a", Value::Float64(30.0));
        assert!(passes(&[Filter::eq("age", 30i64)], &r));
        assert!(passes(&[Filter::compare("age", Comparison::Lte, 30i64)], &r));
    }

    #[test]
    fn test_filter_null_handling() {
        let r = row(1, "a", Value::Null);
        assert!(passes(&[Filter::compare("age", Comparison::IsNull, Value::Null)], &r));
        assert!(!passes(&[Filter::compare("age", Comparison::Lt, 10i64)], &r));
        assert!(!passes(&[Filter::compare("age", Comparison::Gte, 10i64)], &r));
    }

    #[test]
    fn test_filter_in_and_like() {
        let r = row(7, "shipped", Value::Int64(1));
        assert!(passes(&[Filter::one_of("status", ["pending", "shipped"])], &r));
        assert!(passes(&[Filter::compare("status", Comparison::Like, "ship%")], &r));
        assert!(passes(&[Filter::compare("id", Comparison::Like, "_")], &r));
        assert!(!passes(&[Filter::one_of("status", ["shipped"]), Filter::eq("id", 8i64)], &r));
    }

    #[test]
    fn test_filter_custom() {
        let r = row(4, "x", Value::Int64(8));
        let even = Filter::custom("even_id", |row: &RowRef<'_>| row.id().as_i64().is_some_and(|n| n % 2 == 0));
        assert!(passes(&[even], &r));
    }

    #[test]
    fn test_compile_errors() {
        let schema = schema();
        let err = FilterChain::compile(&[Filter::eq("missing", 1i64)], &schema, None).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
        let err = FilterChain::compile(&[Filter::expression("age > 3")], &schema, None).unwrap_err();
        assert!(matches!(err, Error::Expression { .. }));
    }

    #[test]
    fn test_filter_from_json() {
        let filters: Vec<Filter> = serde_json::from_str(
            r#"[{"field": "status", "value": "active"},
                {"field": "age", "comparison": "gte", "value": 18},
                {"expression": "age < 65"}]"#,
        )
        .unwrap();
        assert!(matches!(&filters[0], Filter::Field { comparison: Comparison::Eq, .. }));
        assert!(matches!(&filters[1], Filter::Field { comparison: Comparison::Gte, .. }));
        assert!(matches!(&filters[2], Filter::Expression { .. }));
    }
}
