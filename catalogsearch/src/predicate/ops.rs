// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Comparison semantics shared by in-memory predicates and backends
//!
//! A missing attribute behaves like null: `= null` holds, `!= value` holds,
//! every other comparison fails. Multi-valued attributes satisfy a positive
//! comparison when any element does and a negative one when none does.

use crate::model::AttributeValue;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Native comparison operators understood by every evaluation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
    Like,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Neq => "!=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::StartsWith => "startsWith",
            Comparison::EndsWith => "endsWith",
            Comparison::Contains => "contains",
            Comparison::NotContains => "notContains",
            Comparison::Like => "like",
        }
    }

    /// Negative comparisons hold when no element of a multi-valued
    /// attribute satisfies their positive counterpart
    fn positive(&self) -> Option<Comparison> {
        match self {
            Comparison::Neq => Some(Comparison::Eq),
            Comparison::NotContains => Some(Comparison::Contains),
            _ => None,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Compiled `like` pattern: `*` matches any run, `?` a single character
#[derive(Debug, Clone)]
pub struct LikePattern {
    pattern: String,
    regex: Arc<Regex>,
}

impl LikePattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push_str("(?s)^");
        let mut buf = [0u8; 4];
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
            }
        }
        expr.push('$');
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Arc::new(Regex::new(&expr)?),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Match against a stored value; multi-valued attributes match on any element
    pub fn matches_value(&self, value: Option<&AttributeValue>) -> bool {
        match value {
            Some(AttributeValue::String(s)) => self.is_match(s),
            Some(AttributeValue::Array(items)) => {
                items.iter().any(|item| self.matches_value(Some(item)))
            }
            _ => false,
        }
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for LikePattern {}

impl Hash for LikePattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
    }
}

impl Serialize for LikePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

impl fmt::Display for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.pattern)
    }
}

/// Evaluate `actual <op> expected`
pub fn matches(op: Comparison, actual: Option<&AttributeValue>, expected: &AttributeValue) -> bool {
    let actual = match actual {
        Some(value) if !value.is_null() => value,
        _ => return matches_missing(op, expected),
    };
    if expected.is_null() {
        return op == Comparison::Neq;
    }

    match actual {
        AttributeValue::Array(items) => match op.positive() {
            Some(positive) => !items
                .iter()
                .any(|item| element_matches(positive, item, expected)),
            None => items.iter().any(|item| element_matches(op, item, expected)),
        },
        scalar => scalar_matches(op, scalar, expected),
    }
}

fn matches_missing(op: Comparison, expected: &AttributeValue) -> bool {
    match op {
        Comparison::Eq => expected.is_null(),
        Comparison::Neq => !expected.is_null(),
        Comparison::NotContains => true,
        _ => false,
    }
}

/// Array elements are compared whole: `contains` on a multi-valued
/// attribute is membership, not substring search
fn element_matches(op: Comparison, item: &AttributeValue, expected: &AttributeValue) -> bool {
    match op {
        Comparison::Contains => item == expected,
        _ => scalar_matches(op, item, expected),
    }
}

fn scalar_matches(op: Comparison, actual: &AttributeValue, expected: &AttributeValue) -> bool {
    match op {
        Comparison::Eq => actual == expected,
        Comparison::Neq => actual != expected,
        Comparison::Lt => actual.compare(expected) == Some(Ordering::Less),
        Comparison::Lte => matches!(
            actual.compare(expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Comparison::Gt => actual.compare(expected) == Some(Ordering::Greater),
        Comparison::Gte => matches!(
            actual.compare(expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Comparison::StartsWith => strings(actual, expected).map_or(false, |(a, e)| a.starts_with(e)),
        Comparison::EndsWith => strings(actual, expected).map_or(false, |(a, e)| a.ends_with(e)),
        Comparison::Contains => strings(actual, expected).map_or(false, |(a, e)| a.contains(e)),
        Comparison::NotContains => strings(actual, expected).map_or(true, |(a, e)| !a.contains(e)),
        Comparison::Like => match (actual, expected) {
            (AttributeValue::String(a), AttributeValue::String(pattern)) => {
                LikePattern::compile(pattern).map_or(false, |p| p.is_match(a))
            }
            _ => false,
        },
    }
}

fn strings<'a>(actual: &'a AttributeValue, expected: &'a AttributeValue) -> Option<(&'a str, &'a str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

/// Set membership; a missing attribute is a member only of sets containing null
pub fn is_member(actual: Option<&AttributeValue>, values: &[AttributeValue]) -> bool {
    match actual {
        None | Some(AttributeValue::Null) => values.iter().any(AttributeValue::is_null),
        Some(AttributeValue::Array(items)) => items.iter().any(|item| values.contains(item)),
        Some(scalar) => values.contains(scalar),
    }
}
