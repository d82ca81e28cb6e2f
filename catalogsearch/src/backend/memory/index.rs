// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory inverted index backend
//!
//! Documents are projections of entity records onto the filterable fields.
//! With case-insensitive analysis enabled, string attributes match
//! regardless of case, which makes string matches looser than the graph's
//! exact comparison. Free text is scored by weighted term frequency.

use super::{compare_records, BackendStats};
use crate::backend::{
    BackendError, BackendKind, IndexBackend, IndexHit, IndexQuery, IndexSearchRequest,
    IndexSearchResponse,
};
use crate::model::{AttributeValue, EntityRecord};
use crate::predicate::{Comparison, LikePattern, Predicate};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct IndexedDoc {
    source: EntityRecord,
    analyzed: EntityRecord,
}

/// Inverted index kept in memory
#[derive(Debug)]
pub struct InMemoryIndex {
    fields: Arc<BTreeSet<String>>,
    case_insensitive: bool,
    docs: RwLock<Vec<IndexedDoc>>,
    stats: BackendStats,
}

fn is_system_field(field: &str) -> bool {
    field.starts_with("__")
}

impl InMemoryIndex {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: Arc::new(fields.into_iter().map(Into::into).collect()),
            case_insensitive: false,
            docs: RwLock::new(Vec::new()),
            stats: BackendStats::default(),
        }
    }

    /// Match string attributes regardless of case
    pub fn with_case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    fn analyze(&self, source: &EntityRecord) -> EntityRecord {
        let mut analyzed = source.clone();
        if self.case_insensitive {
            for value in analyzed.attributes.values_mut() {
                *value = value.folded();
            }
        }
        analyzed
    }

    /// Add or replace the document for a record
    pub fn index(&self, record: &EntityRecord) {
        let source = record.project(|property| self.fields.contains(property));
        let doc = IndexedDoc {
            analyzed: self.analyze(&source),
            source,
        };
        let mut docs = self.docs.write();
        match docs.iter_mut().find(|d| d.source.guid == doc.source.guid) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    pub fn index_all<'a, I: IntoIterator<Item = &'a EntityRecord>>(&self, records: I) {
        for record in records {
            self.index(record);
        }
    }

    pub fn remove(&self, guid: &str) -> bool {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| d.source.guid != guid);
        docs.len() != before
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    fn fold(&self, field: &str, value: &AttributeValue) -> AttributeValue {
        if self.case_insensitive && !is_system_field(field) {
            value.folded()
        } else {
            value.clone()
        }
    }

    fn compile(&self, query: &IndexQuery) -> Result<Predicate, BackendError> {
        let predicate = match query {
            IndexQuery::MatchAll => Predicate::Always,
            IndexQuery::Term {
                field,
                op: Comparison::Like,
                value,
            } => {
                let folded = self.fold(field, value);
                let pattern = LikePattern::compile(&folded.to_term()).map_err(|e| {
                    BackendError::Unsupported {
                        backend: BackendKind::Index,
                        operation: format!("pattern {}: {}", value, e),
                    }
                })?;
                Predicate::like(field.clone(), pattern)
            }
            IndexQuery::Term { field, op, value } => {
                Predicate::compare(field.clone(), *op, self.fold(field, value))
            }
            IndexQuery::Terms { field, values } => Predicate::in_set(
                field.clone(),
                values.iter().map(|v| self.fold(field, v)).collect(),
            ),
            IndexQuery::Exists(field) => Predicate::not_null(field.clone()),
            IndexQuery::Missing(field) => Predicate::is_null(field.clone()),
            IndexQuery::And(children) => Predicate::all(
                children
                    .iter()
                    .map(|c| self.compile(c))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            IndexQuery::Or(children) => Predicate::any(
                children
                    .iter()
                    .map(|c| self.compile(c))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        Ok(predicate)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn value_tokens(value: &AttributeValue) -> Vec<String> {
    match value {
        AttributeValue::String(s) => tokenize(s),
        AttributeValue::Array(items) => items.iter().flat_map(value_tokens).collect(),
        _ => Vec::new(),
    }
}

/// Weighted term frequency of `terms` across the record's string attributes
fn text_score(record: &EntityRecord, terms: &[String], weights: &BTreeMap<String, f64>) -> f64 {
    record
        .attributes
        .iter()
        .map(|(property, value)| {
            let weight = weights.get(property).copied().unwrap_or(1.0);
            let hits = value_tokens(value)
                .iter()
                .filter(|token| terms.contains(token))
                .count();
            weight * hits as f64
        })
        .sum()
}

#[async_trait]
impl IndexBackend for InMemoryIndex {
    fn filterable_fields(&self) -> Arc<BTreeSet<String>> {
        Arc::clone(&self.fields)
    }

    async fn search(&self, request: &IndexSearchRequest) -> Result<IndexSearchResponse, BackendError> {
        debug!(
            "index search on '{}': {} (offset={}, limit={})",
            request.index_name,
            request.wire_query(),
            request.offset,
            request.limit
        );
        let predicate = self.compile(&request.query)?;
        let terms = request
            .free_text
            .as_deref()
            .map(tokenize)
            .unwrap_or_default();

        let docs = self.docs.read();
        let mut scored: Vec<(&IndexedDoc, f64)> = docs
            .iter()
            .filter(|doc| predicate.evaluate(&doc.analyzed))
            .filter_map(|doc| {
                if terms.is_empty() {
                    return Some((doc, 1.0));
                }
                let score = text_score(&doc.source, &terms, &request.attribute_weights);
                (score > 0.0).then_some((doc, score))
            })
            .filter(|(_, score)| request.min_score.map_or(true, |min| *score >= min))
            .collect();

        if let Some(sort) = &request.sort {
            scored.sort_by(|(a, _), (b, _)| compare_records(&a.source, &b.source, sort));
        } else if !terms.is_empty() {
            scored.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        }

        let total = scored.len() as u64;
        let hits: Vec<IndexHit> = scored
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|(doc, score)| IndexHit {
                record: doc.source.clone(),
                score,
            })
            .collect();
        drop(docs);

        self.stats.record_call(hits.len());
        Ok(IndexSearchResponse { hits, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SortSpec;
    use crate::model::SortOrder;

    fn index() -> InMemoryIndex {
        let index = InMemoryIndex::new([
            "__guid",
            "__typeName",
            "__state",
            "Asset.name",
            "Asset.description",
        ])
        .with_case_insensitive(true);
        index.index_all(&[
            EntityRecord::new("t1", "Table")
                .with_attribute("Asset.name", "Orders")
                .with_attribute("Asset.description", "customer orders by day")
                .with_attribute("Asset.owner", "alice"),
            EntityRecord::new("t2", "Table")
                .with_attribute("Asset.name", "customers")
                .with_attribute("Asset.description", "orders placed"),
            EntityRecord::new("v1", "View").with_attribute("Asset.name", "order_summary"),
        ]);
        index
    }

    fn request(query: IndexQuery) -> IndexSearchRequest {
        IndexSearchRequest::new("vertex_index", query).page(0, 10)
    }

    #[test]
    fn test_documents_are_projected() {
        let index = index();
        let docs = index.docs.read();
        assert!(!docs[0].source.attributes.contains_key("Asset.owner"));
        assert_eq!(
            docs[0].analyzed.attributes["Asset.name"],
            AttributeValue::from("orders")
        );
    }

    #[tokio::test]
    async fn test_case_insensitive_terms() {
        let index = index();
        let response = index
            .search(&request(IndexQuery::term(
                "Asset.name",
                Comparison::Eq,
                "ORDERS".into(),
            )))
            .await
            .unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].record.guid, "t1");
        assert_eq!(
            response.hits[0].record.attributes["Asset.name"],
            AttributeValue::from("Orders")
        );
    }

    #[tokio::test]
    async fn test_system_fields_are_not_folded() {
        let index = index();
        let response = index
            .search(&request(IndexQuery::terms("__typeName", vec!["View".into()])))
            .await
            .unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].record.guid, "v1");
    }

    #[tokio::test]
    async fn test_free_text_scoring_and_weights() {
        let index = index();
        let mut req = request(IndexQuery::MatchAll);
        req.free_text = Some("orders".into());

        let response = index.search(&req).await.unwrap();
        let guids: Vec<&str> = response.hits.iter().map(|h| h.record.guid.as_str()).collect();
        assert_eq!(guids, vec!["t1", "t2"]);
        assert_eq!(response.hits[0].score, 2.0);

        req.attribute_weights.insert("Asset.description".into(), 5.0);
        req.min_score = Some(5.0);
        let weighted = index.search(&req).await.unwrap();
        assert_eq!(weighted.total, 2);
        assert_eq!(weighted.hits[0].score, 6.0);
    }

    #[tokio::test]
    async fn test_sort_and_paging() {
        let index = index();
        let mut req = request(IndexQuery::MatchAll).page(1, 1);
        req.sort = Some(SortSpec::new("Asset.name", SortOrder::Ascending));

        let response = index.search(&req).await.unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(response.hits.len(), 1);
        // byte order: "Orders" < "customers" < "order_summary"
        assert_eq!(response.hits[0].record.guid, "t2");
        assert_eq!(index.stats().calls(), 1);
    }

    #[tokio::test]
    async fn test_count_only_request() {
        let index = index();
        let response = index
            .search(&request(IndexQuery::Exists("Asset.description".into())).page(0, 0))
            .await
            .unwrap();
        assert_eq!(response.total, 2);
        assert!(response.hits.is_empty());
    }
}
