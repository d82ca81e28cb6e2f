// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Classification filters

use crate::backend::{GraphClause, GraphQuery};
use crate::error::{SearchError, SearchResult};
use crate::model::{AttributeValue, PROPAGATED_TRAIT_NAMES_PROPERTY_KEY, TRAIT_NAMES_PROPERTY_KEY};
use crate::predicate::{Comparison, Predicate};
use crate::registry::TypeRegistry;
use std::collections::BTreeSet;

/// Matches any classified entity
pub const WILDCARD_CLASSIFICATION: &str = "*";
pub const ALL_CLASSIFICATIONS: &str = "_CLASSIFIED";
pub const ALL_CLASSIFICATION_TYPES: &str = "_ALL_CLASSIFICATION_TYPES";
/// Matches entities with no classification at all
pub const NO_CLASSIFICATIONS: &str = "_NOT_CLASSIFIED";

/// Resolved classification constraint of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationFilter {
    /// At least one direct or propagated classification
    Any,
    /// Neither direct nor propagated classifications
    NotClassified,
    /// A direct or propagated classification from the set (subtypes included)
    Specific(BTreeSet<String>),
}

impl ClassificationFilter {
    /// Resolve requested classification names; `None` when nothing was requested
    pub fn resolve(
        names: &[String],
        registry: &dyn TypeRegistry,
    ) -> SearchResult<Option<ClassificationFilter>> {
        if names.is_empty() {
            return Ok(None);
        }
        if names.iter().any(|n| n == NO_CLASSIFICATIONS) {
            if names.len() > 1 {
                return Err(SearchError::invalid_filter(
                    format!("classification = {}", names.join(",")),
                    format!("{} cannot be combined with other classifications", NO_CLASSIFICATIONS),
                ));
            }
            return Ok(Some(ClassificationFilter::NotClassified));
        }
        if names.iter().any(|n| {
            n == WILDCARD_CLASSIFICATION || n == ALL_CLASSIFICATIONS || n == ALL_CLASSIFICATION_TYPES
        }) {
            return Ok(Some(ClassificationFilter::Any));
        }

        let mut expanded = BTreeSet::new();
        for name in names {
            if !registry.classification_type_exists(name) {
                return Err(SearchError::invalid_filter(
                    format!("classification = {}", name),
                    format!("unknown classification '{}'", name),
                ));
            }
            expanded.extend(registry.classification_subtypes(name));
        }
        Ok(Some(ClassificationFilter::Specific(expanded)))
    }

    /// Number of names a native query has to carry
    pub fn native_size(&self) -> usize {
        match self {
            ClassificationFilter::Specific(names) => names.len(),
            _ => 0,
        }
    }

    pub fn predicate(&self) -> Predicate {
        match self {
            ClassificationFilter::Any => Predicate::classified(),
            ClassificationFilter::NotClassified => Predicate::not_classified(),
            ClassificationFilter::Specific(names) => Predicate::classified_as(names.clone()),
        }
    }

    /// Graph clauses expressing the same constraint natively
    pub fn graph_clauses(&self) -> Vec<GraphClause> {
        match self {
            ClassificationFilter::Any => vec![GraphClause::Or(vec![
                GraphQuery::new().has(TRAIT_NAMES_PROPERTY_KEY, Comparison::Neq, AttributeValue::Null),
                GraphQuery::new().has(
                    PROPAGATED_TRAIT_NAMES_PROPERTY_KEY,
                    Comparison::Neq,
                    AttributeValue::Null,
                ),
            ])],
            ClassificationFilter::NotClassified => vec![
                GraphClause::Has {
                    property: TRAIT_NAMES_PROPERTY_KEY.to_string(),
                    op: Comparison::Eq,
                    value: AttributeValue::Null,
                },
                GraphClause::Has {
                    property: PROPAGATED_TRAIT_NAMES_PROPERTY_KEY.to_string(),
                    op: Comparison::Eq,
                    value: AttributeValue::Null,
                },
            ],
            ClassificationFilter::Specific(names) => {
                let values: Vec<AttributeValue> =
                    names.iter().map(|n| AttributeValue::from(n.as_str())).collect();
                vec![GraphClause::Or(vec![
                    GraphQuery::new().in_set(TRAIT_NAMES_PROPERTY_KEY, values.clone()),
                    GraphQuery::new().in_set(PROPAGATED_TRAIT_NAMES_PROPERTY_KEY, values),
                ])]
            }
        }
    }
}
