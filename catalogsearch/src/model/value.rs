// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Attribute value type system for catalog entities
//!
//! Supports the value shapes carried by entity attributes and filter criteria:
//! - Basic types: String, Number, Boolean, Null
//! - Temporal types: DateTime (UTC)
//! - Collections: Array

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Value types for entity attributes and filter operands
///
/// Deserialization is untagged so that plain JSON values map directly onto
/// variants. Date values arrive as strings or epoch millis and are coerced to
/// `DateTime` against the attribute's declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<AttributeValue>),
    #[serde(skip_deserializing)]
    DateTime(DateTime<Utc>),
}

impl AttributeValue {
    /// Extract as number if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract as string if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as boolean if possible
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as datetime if possible
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            AttributeValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Extract as array if possible
    pub fn as_array(&self) -> Option<&Vec<AttributeValue>> {
        match self {
            AttributeValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "Null",
            AttributeValue::Boolean(_) => "Boolean",
            AttributeValue::Number(_) => "Number",
            AttributeValue::String(_) => "String",
            AttributeValue::Array(_) => "Array",
            AttributeValue::DateTime(_) => "DateTime",
        }
    }

    /// Build a datetime value from epoch milliseconds
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(AttributeValue::DateTime)
    }

    /// Compare two scalar values of the same kind.
    ///
    /// Returns `None` for mismatched kinds, nulls and arrays; callers treat
    /// that as "not comparable" rather than as an ordering.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::Number(a), AttributeValue::Number(b)) => a.partial_cmp(b),
            (AttributeValue::String(a), AttributeValue::String(b)) => Some(a.cmp(b)),
            (AttributeValue::Boolean(a), AttributeValue::Boolean(b)) => Some(a.cmp(b)),
            (AttributeValue::DateTime(a), AttributeValue::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Lowercased copy of this value, used by case-folding index analyzers
    pub fn folded(&self) -> AttributeValue {
        match self {
            AttributeValue::String(s) => AttributeValue::String(s.to_lowercase()),
            AttributeValue::Array(items) => {
                AttributeValue::Array(items.iter().map(AttributeValue::folded).collect())
            }
            other => other.clone(),
        }
    }

    /// Render as a bare term for index query strings
    pub fn to_term(&self) -> String {
        match self {
            AttributeValue::Null => "null".to_string(),
            AttributeValue::Boolean(b) => b.to_string(),
            AttributeValue::Number(n) => n.to_string(),
            AttributeValue::String(s) => s.clone(),
            AttributeValue::DateTime(dt) => dt.timestamp_millis().to_string(),
            AttributeValue::Array(items) => items
                .iter()
                .map(AttributeValue::to_term)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::String(s) => write!(f, "'{}'", s),
            AttributeValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            AttributeValue::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(dt: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(dt)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(vec: Vec<T>) -> Self {
        AttributeValue::Array(vec.into_iter().map(Into::into).collect())
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            AttributeValue::Null => 0.hash(state),
            AttributeValue::Boolean(b) => {
                1.hash(state);
                b.hash(state);
            }
            AttributeValue::Number(n) => {
                2.hash(state);
                // Handle NaN consistently
                if n.is_nan() {
                    "NaN".hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            AttributeValue::String(s) => {
                3.hash(state);
                s.hash(state);
            }
            AttributeValue::Array(arr) => {
                4.hash(state);
                arr.len().hash(state);
                for item in arr {
                    item.hash(state);
                }
            }
            AttributeValue::DateTime(dt) => {
                5.hash(state);
                dt.timestamp().hash(state);
                dt.timestamp_subsec_nanos().hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_deserialization() {
        let values: Vec<AttributeValue> =
            serde_json::from_str(r#"[null, true, 3.5, "orders", ["a", 1]]"#).unwrap();

        assert_eq!(values[0], AttributeValue::Null);
        assert_eq!(values[1], AttributeValue::Boolean(true));
        assert_eq!(values[2], AttributeValue::Number(3.5));
        assert_eq!(values[3], AttributeValue::from("orders"));
        assert_eq!(
            values[4],
            AttributeValue::Array(vec!["a".into(), AttributeValue::Number(1.0)])
        );
    }

    #[test]
    fn test_compare_requires_matching_kinds() {
        assert_eq!(
            AttributeValue::from(1.0).compare(&AttributeValue::from(2.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            AttributeValue::from("b").compare(&AttributeValue::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            AttributeValue::from("1").compare(&AttributeValue::from(1.0)),
            None
        );
        assert_eq!(AttributeValue::Null.compare(&AttributeValue::Null), None);
    }

    #[test]
    fn test_epoch_millis_round_trip_to_term() {
        let value = AttributeValue::from_epoch_millis(1_700_000_000_000).unwrap();
        assert_eq!(value.to_term(), "1700000000000");
        assert_eq!(value.type_name(), "DateTime");
    }

    #[test]
    fn test_folded_lowercases_nested_strings() {
        let value = AttributeValue::from(vec!["PII", "Email"]);
        assert_eq!(value.folded(), AttributeValue::from(vec!["pii", "email"]));
        assert_eq!(AttributeValue::from(4.0).folded(), AttributeValue::from(4.0));
    }
}
