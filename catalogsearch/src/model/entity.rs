// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Entity records as returned by the graph and index backends

use super::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Storage property holding the entity's unique id
pub const GUID_PROPERTY_KEY: &str = "__guid";
/// Storage property holding the entity's type name
pub const TYPE_NAME_PROPERTY_KEY: &str = "__typeName";
/// Storage property holding the lifecycle state
pub const STATE_PROPERTY_KEY: &str = "__state";
/// Storage property holding directly attached classification names
pub const TRAIT_NAMES_PROPERTY_KEY: &str = "__traitNames";
/// Storage property holding propagated classification names
pub const PROPAGATED_TRAIT_NAMES_PROPERTY_KEY: &str = "__propagatedTraitNames";
pub const TIMESTAMP_PROPERTY_KEY: &str = "__timestamp";
pub const MODIFICATION_TIMESTAMP_PROPERTY_KEY: &str = "__modificationTimestamp";
pub const CREATED_BY_KEY: &str = "__createdBy";
pub const MODIFIED_BY_KEY: &str = "__modifiedBy";

/// Lifecycle state of a catalog entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityState {
    #[default]
    Active,
    Deleted,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::Active => "ACTIVE",
            EntityState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entity
///
/// `attributes` is keyed by storage property name (`Type.attribute`), the
/// name the backends store and filter on. Core fields (guid, type, state,
/// classifications) are exposed as system properties through [`property`].
///
/// [`property`]: EntityRecord::property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub guid: String,
    pub type_name: String,
    #[serde(default)]
    pub state: EntityState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub propagated_classifications: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl EntityRecord {
    /// Create an active, unclassified entity with no attributes
    pub fn new(guid: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            type_name: type_name.into(),
            state: EntityState::Active,
            classifications: Vec::new(),
            propagated_classifications: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        property: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(property.into(), value.into());
        self
    }

    pub fn with_classification(mut self, name: impl Into<String>) -> Self {
        self.classifications.push(name.into());
        self
    }

    pub fn with_propagated_classification(mut self, name: impl Into<String>) -> Self {
        self.propagated_classifications.push(name.into());
        self
    }

    pub fn with_state(mut self, state: EntityState) -> Self {
        self.state = state;
        self
    }

    /// Look up a storage property, including system properties
    pub fn property(&self, name: &str) -> Option<Cow<'_, AttributeValue>> {
        match name {
            GUID_PROPERTY_KEY => Some(Cow::Owned(AttributeValue::from(self.guid.as_str()))),
            TYPE_NAME_PROPERTY_KEY => {
                Some(Cow::Owned(AttributeValue::from(self.type_name.as_str())))
            }
            STATE_PROPERTY_KEY => Some(Cow::Owned(AttributeValue::from(self.state.as_str()))),
            TRAIT_NAMES_PROPERTY_KEY if !self.classifications.is_empty() => Some(Cow::Owned(
                AttributeValue::from(self.classifications.clone()),
            )),
            PROPAGATED_TRAIT_NAMES_PROPERTY_KEY if !self.propagated_classifications.is_empty() => {
                Some(Cow::Owned(AttributeValue::from(
                    self.propagated_classifications.clone(),
                )))
            }
            TRAIT_NAMES_PROPERTY_KEY | PROPAGATED_TRAIT_NAMES_PROPERTY_KEY => None,
            _ => self.attributes.get(name).map(Cow::Borrowed),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EntityState::Active
    }

    /// True when any classification is attached directly or by propagation
    pub fn is_classified(&self) -> bool {
        !self.classifications.is_empty() || !self.propagated_classifications.is_empty()
    }

    /// True when a direct or propagated classification is in `names`
    pub fn has_classification_in<'a, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'a String> + Copy,
    {
        let matches = |attached: &String| names.into_iter().any(|name| name == attached);
        self.classifications.iter().any(matches)
            || self.propagated_classifications.iter().any(matches)
    }

    /// Keep only the attributes whose storage property is accepted by `keep`
    pub fn project<F>(&self, keep: F) -> EntityRecord
    where
        F: Fn(&str) -> bool,
    {
        EntityRecord {
            attributes: self
                .attributes
                .iter()
                .filter(|(property, _)| keep(property))
                .map(|(property, value)| (property.clone(), value.clone()))
                .collect(),
            ..self.clone()
        }
    }
}
