// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory graph backend

use super::{compare_records, BackendStats};
use crate::backend::{BackendError, BackendKind, GraphBackend, GraphClause, GraphQuery};
use crate::model::{AttributeValue, EntityRecord};
use crate::predicate::{Comparison, LikePattern, Predicate};
use async_trait::async_trait;
use log::trace;
use parking_lot::RwLock;

/// Vertex store keeping records in insertion order
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    records: RwLock<Vec<EntityRecord>>,
    stats: BackendStats,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<EntityRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            stats: BackendStats::default(),
        }
    }

    /// Insert a record, replacing any record with the same guid in place
    pub fn upsert(&self, record: EntityRecord) {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.guid == record.guid) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(&self, guid: &str) -> bool {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.guid != guid);
        records.len() != before
    }

    pub fn get(&self, guid: &str) -> Option<EntityRecord> {
        self.records.read().iter().find(|r| r.guid == guid).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    fn matching(&self, query: &GraphQuery) -> Result<Vec<EntityRecord>, BackendError> {
        let predicate = compile_clauses(query.clauses())?;
        let mut matched: Vec<EntityRecord> = self
            .records
            .read()
            .iter()
            .filter(|record| predicate.evaluate(record))
            .cloned()
            .collect();
        if let Some(sort) = query.ordering() {
            matched.sort_by(|a, b| compare_records(a, b, sort));
        }
        Ok(matched)
    }
}

fn compile_clauses(clauses: &[GraphClause]) -> Result<Predicate, BackendError> {
    clauses
        .iter()
        .map(compile_clause)
        .collect::<Result<Vec<_>, _>>()
        .map(Predicate::all)
}

fn compile_clause(clause: &GraphClause) -> Result<Predicate, BackendError> {
    match clause {
        GraphClause::Has {
            property,
            op: Comparison::Like,
            value,
        } => {
            let pattern = match value {
                AttributeValue::String(p) => LikePattern::compile(p).map_err(|e| {
                    BackendError::Unsupported {
                        backend: BackendKind::Graph,
                        operation: format!("like pattern '{}': {}", p, e),
                    }
                })?,
                other => {
                    return Err(BackendError::Unsupported {
                        backend: BackendKind::Graph,
                        operation: format!("like on {} value", other.type_name()),
                    })
                }
            };
            Ok(Predicate::like(property.clone(), pattern))
        }
        GraphClause::Has {
            property,
            op,
            value,
        } => Ok(Predicate::compare(property.clone(), *op, value.clone())),
        GraphClause::In { property, values } => {
            Ok(Predicate::in_set(property.clone(), values.clone()))
        }
        GraphClause::Or(branches) => branches
            .iter()
            .map(|branch| compile_clauses(branch.clauses()))
            .collect::<Result<Vec<_>, _>>()
            .map(Predicate::any),
    }
}

#[async_trait]
impl GraphBackend for InMemoryGraph {
    async fn vertices(
        &self,
        query: &GraphQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, BackendError> {
        let page: Vec<EntityRecord> = self
            .matching(query)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();
        trace!(
            "graph vertices offset={} limit={} returned={} query={}",
            offset,
            limit,
            page.len(),
            query
        );
        self.stats.record_call(page.len());
        Ok(page)
    }

    async fn vertex_ids(
        &self,
        query: &GraphQuery,
    ) -> Result<Box<dyn Iterator<Item = String> + Send>, BackendError> {
        let ids: Vec<String> = self
            .matching(query)?
            .into_iter()
            .map(|record| record.guid)
            .collect();
        self.stats.record_call(ids.len());
        Ok(Box::new(ids.into_iter()))
    }
}
