// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Caller-supplied filter criteria trees

use super::value::AttributeValue;
use crate::error::{SearchError, SearchResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Boolean combinator for criteria groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    And,
    Or,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::And => write!(f, "AND"),
            Condition::Or => write!(f, "OR"),
        }
    }
}

/// Filter operators accepted in criteria leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    In,
    Like,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
    IsNull,
    NotNull,
    TimeRange,
}

impl Operator {
    /// Canonical wire name
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::In => "in",
            Operator::Like => "like",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::IsNull => "isNull",
            Operator::NotNull => "notNull",
            Operator::TimeRange => "timerange",
        }
    }

    /// Whether the operator needs an operand value
    pub fn requires_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::NotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "<" | "lt" => Operator::Lt,
            ">" | "gt" => Operator::Gt,
            "<=" | "lte" => Operator::Lte,
            ">=" | "gte" => Operator::Gte,
            "=" | "eq" => Operator::Eq,
            "!=" | "neq" => Operator::Neq,
            "in" | "IN" => Operator::In,
            "like" | "LIKE" => Operator::Like,
            "startsWith" | "STARTSWITH" | "begins_with" | "BEGINS_WITH" => Operator::StartsWith,
            "endsWith" | "ENDSWITH" | "ends_with" | "ENDS_WITH" => Operator::EndsWith,
            "contains" | "CONTAINS" => Operator::Contains,
            "notContains" | "NOTCONTAINS" | "not_contains" | "NOT_CONTAINS" => {
                Operator::NotContains
            }
            "isNull" | "ISNULL" | "is_null" | "IS_NULL" => Operator::IsNull,
            "notNull" | "NOTNULL" | "not_null" | "NOT_NULL" => Operator::NotNull,
            "timerange" | "TIMERANGE" | "time_range" | "TIME_RANGE" => Operator::TimeRange,
            other => return Err(format!("unsupported operator '{}'", other)),
        };
        Ok(op)
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A node of the caller's filter tree
///
/// A node is either a group (`condition` plus `criterion`) or a leaf
/// (`attributeName`, `operator`, `attributeValue`). The loose shape matches
/// what callers send over the wire; [`FilterCriteria::node`] validates it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_value: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criterion: Vec<FilterCriteria>,
}

/// Validated view of a criteria node
#[derive(Debug, Clone, Copy)]
pub enum CriteriaNode<'a> {
    Leaf {
        attribute: &'a str,
        operator: Operator,
        value: Option<&'a AttributeValue>,
    },
    Group {
        condition: Condition,
        children: &'a [FilterCriteria],
    },
}

impl FilterCriteria {
    /// Leaf comparing an attribute against a value
    pub fn attribute(
        name: impl Into<String>,
        operator: Operator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            attribute_name: Some(name.into()),
            operator: Some(operator),
            attribute_value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Leaf for operators without an operand (`isNull`, `notNull`)
    pub fn unary(name: impl Into<String>, operator: Operator) -> Self {
        Self {
            attribute_name: Some(name.into()),
            operator: Some(operator),
            ..Default::default()
        }
    }

    pub fn and(children: Vec<FilterCriteria>) -> Self {
        Self::group(Condition::And, children)
    }

    pub fn or(children: Vec<FilterCriteria>) -> Self {
        Self::group(Condition::Or, children)
    }

    pub fn group(condition: Condition, children: Vec<FilterCriteria>) -> Self {
        Self {
            condition: Some(condition),
            criterion: children,
            ..Default::default()
        }
    }

    /// Classify this node as a leaf or a group
    ///
    /// A node carrying a condition is a group even when its child list is
    /// empty; empty groups are treated as "no constraint" by the compiler.
    pub fn node(&self) -> SearchResult<CriteriaNode<'_>> {
        if let Some(condition) = self.condition {
            if self.attribute_name.is_some() {
                return Err(SearchError::invalid_filter(
                    self.to_string(),
                    "a node cannot be both a group and an attribute comparison",
                ));
            }
            return Ok(CriteriaNode::Group {
                condition,
                children: &self.criterion,
            });
        }

        let attribute = match self.attribute_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(SearchError::invalid_filter(
                    self.to_string(),
                    "missing attribute name",
                ))
            }
        };
        let operator = self.operator.ok_or_else(|| {
            SearchError::invalid_filter(self.to_string(), "missing operator")
        })?;
        let value = self.attribute_value.as_ref();
        if operator.requires_value() && value.map_or(true, AttributeValue::is_null) {
            return Err(SearchError::invalid_filter(
                self.to_string(),
                format!("operator '{}' requires a value", operator),
            ));
        }

        Ok(CriteriaNode::Leaf {
            attribute,
            operator,
            value,
        })
    }
}

impl fmt::Display for FilterCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(condition) = self.condition {
            write!(f, "(")?;
            for (i, child) in self.criterion.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", condition)?;
                }
                write!(f, "{}", child)?;
            }
            return write!(f, ")");
        }

        write!(f, "{}", self.attribute_name.as_deref().unwrap_or("?"))?;
        match self.operator {
            Some(op) => write!(f, " {}", op)?,
            None => write!(f, " ?")?,
        }
        if let Some(value) = &self.attribute_value {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}
