// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Search request parameters

use super::criteria::FilterCriteria;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result ordering direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A search request as submitted by callers
///
/// `typeName` and `classification` accept comma separated lists for
/// compatibility with callers that cannot send arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_filters: Option<FilterCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub exclude_deleted_entities: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attribute_relevance: BTreeMap<String, f64>,
    #[serde(default = "default_include_count")]
    pub include_count: bool,
}

fn default_include_count() -> bool {
    true
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            type_name: None,
            type_names: Vec::new(),
            classification: None,
            classifications: Vec::new(),
            entity_filters: None,
            query: None,
            sort_by: None,
            sort_order: None,
            limit: None,
            offset: 0,
            exclude_deleted_entities: false,
            min_score: None,
            attribute_relevance: BTreeMap::new(),
            include_count: true,
        }
    }
}

fn split_names(single: Option<&String>, many: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let candidates = single
        .into_iter()
        .flat_map(|s| s.split(','))
        .chain(many.iter().flat_map(|s| s.split(',')));
    for name in candidates.map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

impl SearchRequest {
    /// Request for entities of a single type
    pub fn for_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Default::default()
        }
    }

    /// Request for entities carrying a classification, of any type
    pub fn for_classification(classification: impl Into<String>) -> Self {
        Self {
            classification: Some(classification.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_names.push(type_name.into());
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classifications.push(classification.into());
        self
    }

    pub fn with_filter(mut self, criteria: FilterCriteria) -> Self {
        self.entity_filters = Some(criteria);
        self
    }

    pub fn with_query(mut self, text: impl Into<String>) -> Self {
        self.query = Some(text.into());
        self
    }

    pub fn sorted_by(mut self, attribute: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(attribute.into());
        self.sort_order = Some(order);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn exclude_deleted(mut self) -> Self {
        self.exclude_deleted_entities = true;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_relevance(mut self, attribute: impl Into<String>, weight: f64) -> Self {
        self.attribute_relevance.insert(attribute.into(), weight);
        self
    }

    pub fn without_count(mut self) -> Self {
        self.include_count = false;
        self
    }

    /// Requested entity type names, de-duplicated in request order
    pub fn requested_types(&self) -> Vec<String> {
        split_names(self.type_name.as_ref(), &self.type_names)
    }

    /// Requested classification names, de-duplicated in request order
    pub fn requested_classifications(&self) -> Vec<String> {
        split_names(self.classification.as_ref(), &self.classifications)
    }

    /// Free-text query, if non-blank
    pub fn free_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_types_merge_and_dedupe() {
        let request = SearchRequest {
            type_name: Some("Table, View".to_string()),
            type_names: vec!["View".to_string(), "Column".to_string()],
            ..Default::default()
        };
        assert_eq!(request.requested_types(), vec!["Table", "View", "Column"]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"typeName": "Table", "query": "  "}"#).unwrap();
        assert!(request.include_count);
        assert_eq!(request.offset, 0);
        assert_eq!(request.limit, None);
        assert_eq!(request.free_text(), None);
        assert!(request.requested_classifications().is_empty());
    }

    #[test]
    fn test_builder() {
        let request = SearchRequest::for_type("Table")
            .with_classification("PII")
            .exclude_deleted()
            .sorted_by("name", SortOrder::Descending)
            .with_limit(5)
            .with_offset(10);

        assert_eq!(request.requested_classifications(), vec!["PII"]);
        assert!(request.exclude_deleted_entities);
        assert_eq!(request.sort_order, Some(SortOrder::Descending));
        assert_eq!(request.limit, Some(5));
        assert_eq!(request.offset, 10);
    }
}
