//! Runtime value types for rule conditions
//!
//! The `Value` enum represents every value a condition can compare: field
//! values extracted from a transaction and the literal operands written in a
//! rule. It is also used for opaque diagnostic payloads on signals.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null value (also used for "undefined" field lookups)
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (f64 for simplicity, handles both int and float)
    Number(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object (key-value map)
    Object(HashMap<String, Value>),
}

impl Value {
    /// Returns true for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce to a number.
    ///
    /// Numeric strings are parsed, booleans become 1/0. Everything else
    /// (including strings that do not parse) has no numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Some(0.0);
                }
                trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
            }
            _ => None,
        }
    }

    /// Borrow the inner string, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the inner array, if any
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Human readable string form used by substring matching
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Build an object value from key/value pairs
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        d.to_f64().map(Value::Number).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_number_coercion() {
        assert_eq!(Value::Number(42.0).as_number(), Some(42.0));
        assert_eq!(Value::String(" 12.5 ".to_string()).as_number(), Some(12.5));
        assert_eq!(Value::Bool(true).as_number(), Some(1.0));
        assert_eq!(Value::String("abc".to_string()).as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
        assert_eq!(Value::Array(vec![]).as_number(), None);
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Number(100.0).to_display_string(), "100");
        assert_eq!(Value::Number(1.5).to_display_string(), "1.5");
        assert_eq!(Value::from("Hello").to_display_string(), "Hello");
        assert_eq!(
            Value::from(vec!["a", "b"]).to_display_string(),
            "a,b".to_string()
        );
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(Value::from("100"), Value::from("100"));
        assert_ne!(Value::from("100"), Value::Number(100.0));
        assert_ne!(Value::Bool(true), Value::Number(1.0));
    }

    #[test]
    fn test_decimal_conversion() {
        let value: Value = Decimal::new(1999, 2).into();
        assert_eq!(value, Value::Number(19.99));
    }

    #[test]
    fn test_value_serde_json() {
        let val = Value::object([
            ("count", Value::Number(42.0)),
            ("active", Value::Bool(true)),
        ]);

        let json = serde_json::to_string(&val).unwrap();
        assert!(json.contains("count"));

        let deserialized: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, deserialized);

        let from_int: Value = serde_json::from_str("[1, \"BTC\", null]").unwrap();
        assert_eq!(
            from_int,
            Value::Array(vec![Value::Number(1.0), Value::from("BTC"), Value::Null])
        );
    }
}
