// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-request query context

use super::termination::TerminationSignal;
use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::model::{FilterCriteria, SearchRequest, SortOrder};
use crate::plan::ClassificationFilter;
use crate::registry::TypeRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Validated view of a search request, shared read-only by every stage
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Requested entity types, in request order
    pub entity_types: Vec<String>,
    /// Requested entity types and all their subtypes
    pub type_closure: BTreeSet<String>,
    pub classification: Option<ClassificationFilter>,
    pub criteria: Option<FilterCriteria>,
    pub free_text: Option<String>,
    /// Sort attribute as the caller named it
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
    pub exclude_deleted: bool,
    pub min_score: Option<f64>,
    pub attribute_relevance: BTreeMap<String, f64>,
    pub include_count: bool,
    pub signal: TerminationSignal,
    pub config: Arc<SearchConfig>,
}

impl QueryContext {
    /// Validate a request against the registry
    pub fn build(
        request: &SearchRequest,
        registry: &dyn TypeRegistry,
        config: Arc<SearchConfig>,
        signal: TerminationSignal,
    ) -> SearchResult<Self> {
        let entity_types = request.requested_types();
        let mut type_closure = BTreeSet::new();
        for type_name in &entity_types {
            if !registry.entity_type_exists(type_name) {
                return Err(SearchError::invalid_filter(
                    format!("typeName = {}", type_name),
                    format!("unknown entity type '{}'", type_name),
                ));
            }
            type_closure.extend(registry.entity_subtypes(type_name));
        }

        let classification =
            ClassificationFilter::resolve(&request.requested_classifications(), registry)?;

        if entity_types.is_empty() && classification.is_none() {
            return Err(SearchError::invalid_filter(
                "typeName",
                "a type name or a classification is required",
            ));
        }

        let sort_by = request
            .sort_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            entity_types,
            type_closure,
            classification,
            criteria: request.entity_filters.clone(),
            free_text: request.free_text().map(str::to_string),
            sort_by,
            sort_order: request.sort_order.unwrap_or_default(),
            limit: config.effective_limit(request.limit),
            offset: request.offset,
            exclude_deleted: request.exclude_deleted_entities,
            min_score: request.min_score,
            attribute_relevance: request.attribute_relevance.clone(),
            include_count: request.include_count,
            signal,
            config,
        })
    }

    pub fn has_entity_types(&self) -> bool {
        !self.entity_types.is_empty()
    }

    /// Free text, relevance weights or a minimum score
    pub fn wants_relevance(&self) -> bool {
        self.free_text.is_some() || !self.attribute_relevance.is_empty() || self.min_score.is_some()
    }
}
