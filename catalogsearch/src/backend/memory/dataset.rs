// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! JSON dataset loader for the in-memory backends
//!
//! A dataset carries type definitions, index settings and entities. Entity
//! attributes are written by attribute name and stored under their storage
//! property with values coerced to the declared type.

use super::{InMemoryGraph, InMemoryIndex};
use crate::error::{SearchError, SearchResult};
use crate::model::EntityRecord;
use crate::registry::types::system_properties;
use crate::registry::{ClassificationTypeDef, EntityTypeDef, InMemoryTypeRegistry, TypeRegistry};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Index backend settings for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    /// Build an index backend at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Filterable attribute names; defaults to every indexed attribute
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub case_insensitive: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fields: None,
            case_insensitive: false,
        }
    }
}

/// Serialized catalog contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    pub classification_types: Vec<ClassificationTypeDef>,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

/// Backends and registry built from a dataset
pub struct LoadedDataset {
    pub registry: Arc<InMemoryTypeRegistry>,
    pub graph: Arc<InMemoryGraph>,
    pub index: Option<Arc<InMemoryIndex>>,
}

impl Dataset {
    pub fn from_json_str(raw: &str) -> SearchResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SearchError::Config(format!("invalid dataset: {}", e)))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SearchResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Build the registry and backends
    pub fn load(self) -> SearchResult<LoadedDataset> {
        let mut registry = InMemoryTypeRegistry::new();
        for def in self.entity_types {
            registry
                .register_entity_type(def)
                .map_err(|e| SearchError::Config(e.to_string()))?;
        }
        for def in self.classification_types {
            registry
                .register_classification_type(def)
                .map_err(|e| SearchError::Config(e.to_string()))?;
        }

        let entities = self
            .entities
            .into_iter()
            .map(|record| normalize_record(&registry, record))
            .collect::<SearchResult<Vec<_>>>()?;

        let index = if self.index.enabled {
            let fields = index_fields(&registry, self.index.fields.as_deref());
            let index =
                InMemoryIndex::new(fields).with_case_insensitive(self.index.case_insensitive);
            index.index_all(&entities);
            Some(Arc::new(index))
        } else {
            None
        };

        info!(
            "Loaded dataset: {} entities, index {}",
            entities.len(),
            if index.is_some() { "enabled" } else { "disabled" }
        );

        Ok(LoadedDataset {
            registry: Arc::new(registry),
            graph: Arc::new(InMemoryGraph::from_records(entities)),
            index,
        })
    }
}

fn normalize_record(
    registry: &InMemoryTypeRegistry,
    mut record: EntityRecord,
) -> SearchResult<EntityRecord> {
    if !registry.entity_type_exists(&record.type_name) {
        return Err(SearchError::Config(format!(
            "entity '{}' has unknown type '{}'",
            record.guid, record.type_name
        )));
    }
    for name in record
        .classifications
        .iter()
        .chain(record.propagated_classifications.iter())
    {
        if !registry.classification_type_exists(name) {
            return Err(SearchError::Config(format!(
                "entity '{}' has unknown classification '{}'",
                record.guid, name
            )));
        }
    }

    let known = registry.attributes_of(&record.type_name);
    let mut attributes = BTreeMap::new();
    for (key, value) in std::mem::take(&mut record.attributes) {
        let resolved = registry
            .resolve_attribute(&record.type_name, &key)
            .or_else(|| known.iter().find(|a| a.storage_property == key).cloned())
            .ok_or_else(|| {
                SearchError::Config(format!(
                    "entity '{}' has unknown attribute '{}' for type '{}'",
                    record.guid, key, record.type_name
                ))
            })?;
        let coerced = resolved.attribute_type.coerce(&value).map_err(|reason| {
            SearchError::Config(format!(
                "entity '{}' attribute '{}': {}",
                record.guid, key, reason
            ))
        })?;
        attributes.insert(resolved.storage_property, coerced);
    }
    record.attributes = attributes;
    Ok(record)
}

fn index_fields(registry: &InMemoryTypeRegistry, names: Option<&[String]>) -> BTreeSet<String> {
    let mut fields: BTreeSet<String> = system_properties().map(str::to_string).collect();
    for type_name in registry.entity_type_names() {
        for attribute in registry.attributes_of(type_name) {
            let wanted = match names {
                Some(names) => names.iter().any(|n| *n == attribute.name),
                None => attribute.indexed,
            };
            if wanted {
                fields.insert(attribute.storage_property);
            }
        }
    }
    fields
}
