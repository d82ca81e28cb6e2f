// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory type registry backed by petgraph type hierarchies

use super::types::{
    system_attribute, ClassificationTypeDef, EntityTypeDef, ResolvedAttribute,
};
use super::{RegistryError, TypeRegistry};
use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Dfs, Reversed};
use std::collections::{BTreeSet, HashMap};

/// Supertype-to-subtype hierarchy
#[derive(Debug, Default)]
struct TypeHierarchy {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl TypeHierarchy {
    fn add(&mut self, name: &str, super_types: &[String]) -> Result<(), RegistryError> {
        if self.nodes.contains_key(name) {
            return Err(RegistryError::DuplicateType(name.to_string()));
        }
        let parents = super_types
            .iter()
            .map(|parent| {
                self.nodes
                    .get(parent)
                    .copied()
                    .ok_or_else(|| RegistryError::UnknownSuperType {
                        type_name: name.to_string(),
                        super_type: parent.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let node = self.graph.add_node(name.to_string());
        for parent in parents {
            self.graph.add_edge(parent, node, ());
        }
        self.nodes.insert(name.to_string(), node);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// The type itself plus every transitive subtype
    fn descendants(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if let Some(&start) = self.nodes.get(name) {
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(node) = dfs.next(&self.graph) {
                found.insert(self.graph[node].clone());
            }
        }
        found
    }

    /// The type itself followed by its supertypes, nearest first
    fn ancestors(&self, name: &str) -> Vec<String> {
        let mut found = Vec::new();
        if let Some(&start) = self.nodes.get(name) {
            let reversed = Reversed(&self.graph);
            let mut bfs = Bfs::new(reversed, start);
            while let Some(node) = bfs.next(reversed) {
                found.push(self.graph[node].clone());
            }
        }
        found
    }
}

/// Type registry holding entity and classification definitions in memory
///
/// Types must be registered after their supertypes.
#[derive(Debug, Default)]
pub struct InMemoryTypeRegistry {
    entity_types: HashMap<String, EntityTypeDef>,
    entity_hierarchy: TypeHierarchy,
    classification_hierarchy: TypeHierarchy,
}

impl InMemoryTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity_type(&mut self, def: EntityTypeDef) -> Result<(), RegistryError> {
        self.entity_hierarchy.add(&def.name, &def.super_types)?;
        debug!(
            "Registered entity type '{}' ({} attributes)",
            def.name,
            def.attributes.len()
        );
        self.entity_types.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn register_classification_type(
        &mut self,
        def: ClassificationTypeDef,
    ) -> Result<(), RegistryError> {
        self.classification_hierarchy
            .add(&def.name, &def.super_types)?;
        debug!("Registered classification type '{}'", def.name);
        Ok(())
    }

    /// Builder form of [`register_entity_type`](Self::register_entity_type)
    pub fn with_entity_type(mut self, def: EntityTypeDef) -> Result<Self, RegistryError> {
        self.register_entity_type(def)?;
        Ok(self)
    }

    /// Builder form of [`register_classification_type`](Self::register_classification_type)
    pub fn with_classification_type(
        mut self,
        def: ClassificationTypeDef,
    ) -> Result<Self, RegistryError> {
        self.register_classification_type(def)?;
        Ok(self)
    }

    /// All attributes visible on a type, including inherited ones
    pub fn attributes_of(&self, type_name: &str) -> Vec<ResolvedAttribute> {
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();
        for ancestor in self.entity_hierarchy.ancestors(type_name) {
            if let Some(def) = self.entity_types.get(&ancestor) {
                for attribute in &def.attributes {
                    if seen.insert(attribute.name.clone()) {
                        resolved.push(ResolvedAttribute::declared(&ancestor, attribute));
                    }
                }
            }
        }
        resolved
    }

    pub fn entity_type_names(&self) -> impl Iterator<Item = &str> {
        self.entity_types.keys().map(String::as_str)
    }
}

impl TypeRegistry for InMemoryTypeRegistry {
    fn entity_type_exists(&self, type_name: &str) -> bool {
        self.entity_hierarchy.contains(type_name)
    }

    fn classification_type_exists(&self, name: &str) -> bool {
        self.classification_hierarchy.contains(name)
    }

    fn resolve_attribute(&self, type_name: &str, attribute: &str) -> Option<ResolvedAttribute> {
        if !self.entity_type_exists(type_name) {
            return None;
        }
        if let Some(system) = system_attribute(attribute) {
            return Some(system);
        }
        self.entity_hierarchy
            .ancestors(type_name)
            .into_iter()
            .find_map(|ancestor| {
                self.entity_types.get(&ancestor).and_then(|def| {
                    def.attributes
                        .iter()
                        .find(|a| a.name == attribute)
                        .map(|a| ResolvedAttribute::declared(&ancestor, a))
                })
            })
    }

    fn entity_subtypes(&self, type_name: &str) -> BTreeSet<String> {
        self.entity_hierarchy.descendants(type_name)
    }

    fn classification_subtypes(&self, name: &str) -> BTreeSet<String> {
        self.classification_hierarchy.descendants(name)
    }
}
