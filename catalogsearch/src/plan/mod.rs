// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query planning
//!
//! Planning turns a validated request into an [`ExecutionPlan`] per stage:
//! which backend runs the native part of the query and which residual
//! predicate has to run in memory on what comes back. The native part and
//! the residual together always describe the full set of requested records.

pub mod cache;
pub mod classification;
pub mod compiler;
pub mod strategy;

pub use cache::{CompiledFilterCache, CompiledFilterKey, FilterCacheStats};
pub use classification::{
    ClassificationFilter, ALL_CLASSIFICATIONS, ALL_CLASSIFICATION_TYPES, NO_CLASSIFICATIONS,
    WILDCARD_CLASSIFICATION,
};
pub use compiler::{CompiledConjunct, CompiledCriteria, FilterCompiler};
pub use strategy::StrategySelector;

use crate::backend::{GraphQuery, IndexQuery, IndexSearchRequest, SortSpec};
use crate::model::{AttributeValue, EntityRecord, StrategyKind, GUID_PROPERTY_KEY};
use crate::predicate::Predicate;
use std::collections::BTreeMap;
use std::fmt;

/// Position of a stage in a processor chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// Produces candidates from the backends
    Primary,
    /// Only narrows records produced by an earlier stage
    Filter,
}

/// Index search without paging
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSearchTemplate {
    pub index_name: String,
    pub query: IndexQuery,
    pub free_text: Option<String>,
    pub sort: Option<SortSpec>,
    pub min_score: Option<f64>,
    pub attribute_weights: BTreeMap<String, f64>,
}

impl IndexSearchTemplate {
    /// Page of the search
    pub fn request(&self, offset: usize, limit: usize) -> IndexSearchRequest {
        IndexSearchRequest {
            index_name: self.index_name.clone(),
            query: self.query.clone(),
            free_text: self.free_text.clone(),
            sort: self.sort.clone(),
            min_score: self.min_score,
            attribute_weights: self.attribute_weights.clone(),
            offset,
            limit,
        }
    }

    /// The same search restricted to the given guids, from the first hit
    pub fn scoped_to(&self, guids: &[String]) -> IndexSearchRequest {
        let ids = guids
            .iter()
            .map(|g| AttributeValue::from(g.as_str()))
            .collect();
        let mut request = self.request(0, guids.len());
        request.query =
            IndexQuery::And(vec![IndexQuery::terms(GUID_PROPERTY_KEY, ids), self.query.clone()])
                .simplify();
        request
    }
}

/// Native part of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    IndexOnly {
        index: IndexSearchTemplate,
    },
    GraphOnly {
        graph: GraphQuery,
    },
    /// Index hits give candidate guids; the graph supplies the records and
    /// evaluates the clauses the index cannot
    Hybrid {
        index: IndexSearchTemplate,
        graph: GraphQuery,
    },
    /// Filter stage over records produced upstream
    InMemory,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::IndexOnly { .. } => StrategyKind::IndexOnly,
            Strategy::GraphOnly { .. } => StrategyKind::GraphOnly,
            Strategy::Hybrid { .. } => StrategyKind::Hybrid,
            Strategy::InMemory => StrategyKind::InMemory,
        }
    }

    pub fn index(&self) -> Option<&IndexSearchTemplate> {
        match self {
            Strategy::IndexOnly { index } | Strategy::Hybrid { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn graph(&self) -> Option<&GraphQuery> {
        match self {
            Strategy::GraphOnly { graph } | Strategy::Hybrid { graph, .. } => Some(graph),
            _ => None,
        }
    }
}

/// Predicates applied in memory to records returned by the backends
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualFilter {
    pub type_membership: Predicate,
    pub attributes: Predicate,
    /// Present only when no native query excludes deleted records
    pub soft_delete: Option<Predicate>,
}

impl Default for ResidualFilter {
    fn default() -> Self {
        Self {
            type_membership: Predicate::Always,
            attributes: Predicate::Always,
            soft_delete: None,
        }
    }
}

impl ResidualFilter {
    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.type_membership.evaluate(record)
            && self.attributes.evaluate(record)
            && self
                .soft_delete
                .as_ref()
                .map_or(true, |p| p.evaluate(record))
    }

    /// Drop non-matching records, keeping order
    pub fn apply(&self, records: &mut Vec<EntityRecord>) {
        self.type_membership.retain(records);
        self.attributes.retain(records);
        if let Some(soft_delete) = &self.soft_delete {
            soft_delete.retain(records);
        }
    }

    /// The residual as a single predicate
    pub fn predicate(&self) -> Predicate {
        let combined = self.type_membership.clone().and(self.attributes.clone());
        match &self.soft_delete {
            Some(p) => combined.and(p.clone()),
            None => combined,
        }
    }
}

impl fmt::Display for ResidualFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate())
    }
}

/// How one stage runs
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub strategy: Strategy,
    pub residual: ResidualFilter,
    /// Index search used to re-rank a filter stage's survivors
    pub rescope: Option<IndexSearchTemplate>,
    /// The native query returns only records the residual accepts
    pub native_exact: bool,
    pub warnings: Vec<String>,
}

impl ExecutionPlan {
    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// The backend applies the request offset itself only when it is the
    /// sole source of records for the page and nothing it returns is dropped
    /// in memory; otherwise its offset would count raw records, not matches
    pub fn backend_applies_offset(&self, has_next_stage: bool) -> bool {
        !has_next_stage && self.native_exact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityState, SortOrder};

    #[test]
    fn test_scoped_request_restarts_at_zero() {
        let template = IndexSearchTemplate {
            index_name: "vertex_index".into(),
            query: IndexQuery::terms("__typeName", vec!["Table".into()]),
            free_text: Some("orders".into()),
            sort: Some(SortSpec::new("Asset.name", SortOrder::Ascending)),
            min_score: None,
            attribute_weights: BTreeMap::new(),
        };
        let page = template.request(40, 20);
        assert_eq!((page.offset, page.limit), (40, 20));

        let scoped = template.scoped_to(&["a".to_string(), "b".to_string()]);
        assert_eq!((scoped.offset, scoped.limit), (0, 2));
        assert_eq!(scoped.free_text.as_deref(), Some("orders"));
        assert!(matches!(scoped.query, IndexQuery::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_residual_applies_every_part() {
        let residual = ResidualFilter {
            type_membership: Predicate::type_in(["Table".to_string()].into_iter().collect()),
            attributes: Predicate::eq("Asset.name", "orders"),
            soft_delete: Some(Predicate::state_is(EntityState::Active)),
        };
        let mut records = vec![
            EntityRecord::new("t1", "Table").with_attribute("Asset.name", "orders"),
            EntityRecord::new("t2", "Table")
                .with_attribute("Asset.name", "orders")
                .with_state(EntityState::Deleted),
            EntityRecord::new("v1", "View").with_attribute("Asset.name", "orders"),
        ];
        assert!(residual.matches(&records[0]));
        residual.apply(&mut records);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].guid, "t1");
    }

    #[test]
    fn test_offset_ownership() {
        let mut graph_only = ExecutionPlan {
            strategy: Strategy::GraphOnly {
                graph: GraphQuery::new(),
            },
            residual: ResidualFilter::default(),
            rescope: None,
            native_exact: true,
            warnings: Vec::new(),
        };
        assert!(graph_only.backend_applies_offset(false));
        assert!(!graph_only.backend_applies_offset(true));

        // a residual that drops records moves the offset onto survivors
        graph_only.native_exact = false;
        assert!(!graph_only.backend_applies_offset(false));
    }
}
