// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Type definitions and attribute typing rules

use crate::model::{
    AttributeValue, Operator, CREATED_BY_KEY, GUID_PROPERTY_KEY,
    MODIFICATION_TIMESTAMP_PROPERTY_KEY, MODIFIED_BY_KEY, PROPAGATED_TRAIT_NAMES_PROPERTY_KEY,
    STATE_PROPERTY_KEY, TIMESTAMP_PROPERTY_KEY, TRAIT_NAMES_PROPERTY_KEY, TYPE_NAME_PROPERTY_KEY,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    #[serde(alias = "int", alias = "long", alias = "float", alias = "double")]
    Number,
    Boolean,
    Date,
    Enum,
    /// Multi-valued string attribute
    Array,
}

impl AttributeType {
    /// Whether `operator` can be evaluated against this type
    pub fn supports(&self, operator: Operator) -> bool {
        use AttributeType::*;
        match operator {
            Operator::Eq
            | Operator::Neq
            | Operator::In
            | Operator::IsNull
            | Operator::NotNull => true,
            Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte => {
                matches!(self, String | Number | Date | Enum)
            }
            Operator::Like | Operator::StartsWith | Operator::EndsWith => {
                matches!(self, String | Enum)
            }
            Operator::Contains | Operator::NotContains => matches!(self, String | Enum | Array),
            Operator::TimeRange => matches!(self, Date),
        }
    }

    /// Whether an index match on this type may be looser than exact
    /// comparison (analyzed text fields)
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            AttributeType::String | AttributeType::Enum | AttributeType::Array
        )
    }

    /// Coerce a scalar operand or stored value to this type
    pub fn coerce(&self, value: &AttributeValue) -> Result<AttributeValue, String> {
        if value.is_null() {
            return Ok(AttributeValue::Null);
        }
        match self {
            AttributeType::String | AttributeType::Enum => match value {
                AttributeValue::String(_) => Ok(value.clone()),
                AttributeValue::Number(_) | AttributeValue::Boolean(_) => {
                    Ok(AttributeValue::String(value.to_term()))
                }
                other => Err(format!("expected a string, got {}", other.type_name())),
            },
            AttributeType::Number => match value {
                AttributeValue::Number(_) => Ok(value.clone()),
                AttributeValue::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(AttributeValue::Number)
                    .map_err(|_| format!("'{}' is not a number", s)),
                other => Err(format!("expected a number, got {}", other.type_name())),
            },
            AttributeType::Boolean => match value {
                AttributeValue::Boolean(_) => Ok(value.clone()),
                AttributeValue::String(s) if s.eq_ignore_ascii_case("true") => {
                    Ok(AttributeValue::Boolean(true))
                }
                AttributeValue::String(s) if s.eq_ignore_ascii_case("false") => {
                    Ok(AttributeValue::Boolean(false))
                }
                other => Err(format!("'{}' is not a boolean", other)),
            },
            AttributeType::Date => match value {
                AttributeValue::DateTime(_) => Ok(value.clone()),
                AttributeValue::Number(n) => AttributeValue::from_epoch_millis(*n as i64)
                    .ok_or_else(|| format!("{} is out of range for a date", n)),
                AttributeValue::String(s) => parse_date(s),
                other => Err(format!("expected a date, got {}", other.type_name())),
            },
            AttributeType::Array => match value {
                AttributeValue::Array(items) => items
                    .iter()
                    .map(|item| AttributeType::String.coerce(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AttributeValue::Array),
                scalar => AttributeType::String.coerce(scalar),
            },
        }
    }
}

fn parse_date(raw: &str) -> Result<AttributeValue, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(AttributeValue::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(AttributeValue::DateTime(midnight.and_utc()));
        }
    }
    if let Ok(millis) = raw.parse::<i64>() {
        if let Some(value) = AttributeValue::from_epoch_millis(millis) {
            return Ok(value);
        }
    }
    Err(format!("'{}' is not a date", raw))
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Enum => "enum",
            AttributeType::Array => "array",
        };
        f.write_str(name)
    }
}

/// Attribute declared on an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    #[serde(default = "default_indexed")]
    pub indexed: bool,
}

fn default_indexed() -> bool {
    true
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            indexed: true,
        }
    }

    /// Mark the attribute as not maintained by the index backend
    pub fn unindexed(mut self) -> Self {
        self.indexed = false;
        self
    }
}

/// Entity type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDef {
    pub name: String,
    #[serde(default)]
    pub super_types: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

impl EntityTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_types: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_super_type(mut self, name: impl Into<String>) -> Self {
        self.super_types.push(name.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Classification type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationTypeDef {
    pub name: String,
    #[serde(default)]
    pub super_types: Vec<String>,
}

impl ClassificationTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_types: Vec::new(),
        }
    }

    pub fn with_super_type(mut self, name: impl Into<String>) -> Self {
        self.super_types.push(name.into());
        self
    }
}

/// An attribute resolved against a concrete entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedAttribute {
    pub name: String,
    pub storage_property: String,
    pub attribute_type: AttributeType,
    pub indexed: bool,
    /// Type that declares the attribute, or `None` for system attributes
    pub declaring_type: Option<String>,
}

impl ResolvedAttribute {
    pub fn declared(type_name: &str, def: &AttributeDef) -> Self {
        Self {
            name: def.name.clone(),
            storage_property: format!("{}.{}", type_name, def.name),
            attribute_type: def.attribute_type,
            indexed: def.indexed,
            declaring_type: Some(type_name.to_string()),
        }
    }
}

const SYSTEM_ATTRIBUTES: &[(&str, AttributeType)] = &[
    (GUID_PROPERTY_KEY, AttributeType::String),
    (TYPE_NAME_PROPERTY_KEY, AttributeType::String),
    (STATE_PROPERTY_KEY, AttributeType::Enum),
    (TIMESTAMP_PROPERTY_KEY, AttributeType::Date),
    (MODIFICATION_TIMESTAMP_PROPERTY_KEY, AttributeType::Date),
    (CREATED_BY_KEY, AttributeType::String),
    (MODIFIED_BY_KEY, AttributeType::String),
    (TRAIT_NAMES_PROPERTY_KEY, AttributeType::Array),
    (PROPAGATED_TRAIT_NAMES_PROPERTY_KEY, AttributeType::Array),
];

/// Resolve an attribute every entity type carries
pub fn system_attribute(name: &str) -> Option<ResolvedAttribute> {
    SYSTEM_ATTRIBUTES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(key, attribute_type)| ResolvedAttribute {
            name: key.to_string(),
            storage_property: key.to_string(),
            attribute_type: *attribute_type,
            indexed: true,
            declaring_type: None,
        })
}

/// Storage properties of all system attributes
pub fn system_properties() -> impl Iterator<Item = &'static str> {
    SYSTEM_ATTRIBUTES.iter().map(|(key, _)| *key)
}
