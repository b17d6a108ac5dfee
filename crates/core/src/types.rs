//! Column type definitions for the Horizon engine.
//!
//! A column type is a declaration, not a constraint: input values are coerced
//! on the way into storage and anything that cannot be coerced is stored as-is.

use crate::value::Value;
use alloc::string::ToString;
use serde::{Deserialize, Serialize};

/// Declared type of a column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    /// No coercion
    #[default]
    Any,
    /// Boolean (true/false)
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// Floating point number
    Number,
    /// UTF-8 string
    String,
    /// Unix timestamp in milliseconds
    Date,
}

impl ColumnType {
    /// Coerces an incoming value to this column type.
    ///
    /// Null always stays Null so that default values can still apply.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Any, v) => v,
            (ColumnType::Boolean, Value::Int64(i)) => Value::Boolean(i != 0),
            (ColumnType::Boolean, Value::String(s)) => match s.as_str() {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" | "" => Value::Boolean(false),
                _ => Value::String(s),
            },
            (ColumnType::Integer | ColumnType::Date, Value::Float64(f)) if !f.is_nan() => {
                Value::Int64(f as i64)
            }
            (ColumnType::Integer | ColumnType::Date, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int64(i),
                Err(_) => Value::String(s),
            },
            (ColumnType::Number, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float64(f),
                Err(_) => Value::String(s),
            },
            (ColumnType::String, Value::Int64(i)) => Value::String(i.to_string()),
            (ColumnType::String, Value::Float64(f)) => Value::String(f.to_string()),
            (ColumnType::String, Value::Boolean(b)) => Value::String(b.to_string()),
            (_, v) => v,
        }
    }

    /// Returns whether values of this type take part in numeric aggregation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_integer() {
        assert_eq!(ColumnType::Integer.coerce(Value::from("42")), Value::Int64(42));
        assert_eq!(ColumnType::Integer.coerce(Value::Float64(3.9)), Value::Int64(3));
        assert_eq!(ColumnType::Integer.coerce(Value::from("abc")), Value::from("abc"));
    }

    #[test]
    fn test_coerce_number_and_string() {
        assert_eq!(ColumnType::Number.coerce(Value::from("1.5")), Value::Float64(1.5));
        assert_eq!(ColumnType::Number.coerce(Value::Int64(2)), Value::Int64(2));
        assert_eq!(ColumnType::String.coerce(Value::Int64(7)), Value::from("7"));
    }

    #[test]
    fn test_coerce_keeps_null() {
        assert_eq!(ColumnType::Boolean.coerce(Value::Null), Value::Null);
        assert_eq!(ColumnType::Any.coerce(Value::Null), Value::Null);
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(ColumnType::Boolean.coerce(Value::Int64(0)), Value::Boolean(false));
        assert_eq!(ColumnType::Boolean.coerce(Value::from("true")), Value::Boolean(true));
    }

    #[test]
    fn test_is_numeric() {
        assert!(ColumnType::Integer.is_numeric());
        assert!(!ColumnType::String.is_numeric());
    }
}
