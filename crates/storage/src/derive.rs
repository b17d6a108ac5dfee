//! Per-column derivation pipeline.
//!
//! Every stored row is built column by column, in schema order, through five
//! steps:
//!
//! 1. copy the input field, coerced to the column type, unless the column
//!    has a `value`
//! 2. apply `default_value` if the cell is still Null
//! 3. apply `value`
//! 4. evaluate `expression`
//! 5. call the resolver for `resolve`
//!
//! Later columns see the results of earlier ones on the same row.
//! Expressions are compiled once, when the pipeline is built.

use alloc::rc::Rc;
use alloc::vec::Vec;
use horizon_core::expr::{Expression, ExpressionEngine};
use horizon_core::schema::{ColumnValue, DefaultValue, Schema};
use horizon_core::text::render_template;
use horizon_core::{Error, Result, Row, RowInput, Value};

use crate::resolve::Resolve;

/// Compiled derivation for one schema.
#[derive(Clone, Default)]
pub struct Derivation {
    expressions: Vec<Option<Rc<dyn Expression>>>,
}

impl core::fmt::Debug for Derivation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let compiled = self.expressions.iter().filter(|e| e.is_some()).count();
        f.debug_struct("Derivation").field("expressions", &compiled).finish()
    }
}

impl Derivation {
    /// Compiles the expressions of `schema`.
    ///
    /// Fails with `Error::Expression` if a column has an expression and no
    /// engine is given, or if the engine rejects the text.
    pub fn compile(schema: &Schema, engine: Option<&dyn ExpressionEngine>) -> Result<Self> {
        let mut expressions = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            let compiled = match &column.expression {
                Some(text) => {
                    let engine = engine.ok_or_else(|| {
                        Error::expression(text.as_str(), "no expression engine configured")
                    })?;
                    Some(engine.compile(text)?)
                }
                None => None,
            };
            expressions.push(compiled);
        }
        Ok(Self { expressions })
    }

    /// Builds a row from `input`.
    ///
    /// With `previous`, the pipeline runs against a copy of the existing row
    /// so that fields missing from `input` keep their stored values.
    pub fn derive(
        &self,
        schema: &Schema,
        input: &RowInput,
        previous: Option<&Row>,
        resolver: &dyn Resolve,
    ) -> Row {
        let mut values = match previous {
            Some(row) => row.values().to_vec(),
            None => alloc::vec![Value::Null; schema.len()],
        };
        values.resize(schema.len(), Value::Null);

        for (i, column) in schema.columns().iter().enumerate() {
            let incoming = input.field(schema, i);

            if column.value.is_none() {
                if let Some(v) = incoming {
                    values[i] = column.column_type.coerce(v.clone());
                }
            }

            if values[i].is_null() {
                if let Some(default) = &column.default_value {
                    let row = schema.row_ref(&values);
                    values[i] = match default {
                        DefaultValue::Static(v) => v.clone(),
                        DefaultValue::Template { template } => Value::String(render_template(template, &row)),
                        DefaultValue::Computed(f) => (**f)(&row),
                    };
                }
            }

            if let Some(value) = &column.value {
                let previous_value = previous.and_then(|r| r.get(i)).cloned().unwrap_or_default();
                let row = schema.row_ref(&values);
                values[i] = match value {
                    ColumnValue::Static(v) => v.clone(),
                    ColumnValue::Template { template } => Value::String(render_template(template, &row)),
                    ColumnValue::Computed(f) => {
                        (**f)(&row, incoming.unwrap_or(&Value::Null), &previous_value, &column.name)
                    }
                };
            }

            if let Some(Some(expr)) = self.expressions.get(i) {
                values[i] = expr.evaluate(&schema.row_ref(&values));
            }

            if let Some(spec) = &column.resolve {
                values[i] = resolver.resolve(spec, &schema.row_ref(&values));
            }
        }

        match previous {
            Some(row) => {
                let mut next = row.clone();
                *next.values_mut() = values;
                next
            }
            None => Row::new(values),
        }
    }

    /// Returns true if any column reads from another table or view.
    pub fn has_resolve(schema: &Schema) -> bool {
        schema.columns().iter().any(|c| c.resolve.is_some())
    }
}
