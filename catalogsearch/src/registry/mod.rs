// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Type registry: entity and classification types, attribute resolution

pub mod memory;
pub mod types;

pub use memory::InMemoryTypeRegistry;
pub use types::{
    system_attribute, AttributeDef, AttributeType, ClassificationTypeDef, EntityTypeDef,
    ResolvedAttribute,
};

use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while registering types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Type already registered: {0}")]
    DuplicateType(String),

    #[error("Type '{type_name}' references unknown supertype '{super_type}'")]
    UnknownSuperType {
        type_name: String,
        super_type: String,
    },
}

/// Read access to the catalog's type system
pub trait TypeRegistry: Send + Sync {
    fn entity_type_exists(&self, type_name: &str) -> bool;

    fn classification_type_exists(&self, name: &str) -> bool;

    /// Resolve an attribute on a type, following inheritance
    fn resolve_attribute(&self, type_name: &str, attribute: &str) -> Option<ResolvedAttribute>;

    /// The type and all its transitive subtypes; empty for unknown types
    fn entity_subtypes(&self, type_name: &str) -> BTreeSet<String>;

    /// The classification and all its transitive subtypes
    fn classification_subtypes(&self, name: &str) -> BTreeSet<String>;
}
