// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Strategy selection
//!
//! Picks the backend(s) a stage queries natively and the residual it
//! evaluates in memory. The index is only worth a round trip when it can
//! rank (free text, relevance weights, minimum score) or when it narrows a
//! filter the graph would otherwise evaluate alone.

use super::{
    CompiledCriteria, ExecutionPlan, IndexSearchTemplate, ResidualFilter, StageRole, Strategy,
};
use crate::backend::{GraphClause, GraphQuery, IndexQuery, SortSpec};
use crate::error::{SearchError, SearchResult};
use crate::exec::QueryContext;
use crate::model::{
    AttributeValue, EntityState, GUID_PROPERTY_KEY, STATE_PROPERTY_KEY, TYPE_NAME_PROPERTY_KEY,
};
use crate::predicate::{Comparison, Predicate};
use crate::registry::types::system_attribute;
use crate::registry::{ResolvedAttribute, TypeRegistry};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Chooses an [`ExecutionPlan`] for one stage of a request
pub struct StrategySelector<'a> {
    context: &'a QueryContext,
    registry: &'a dyn TypeRegistry,
    index_fields: Option<&'a BTreeSet<String>>,
}

impl<'a> StrategySelector<'a> {
    /// `index_fields` is `None` when no index backend is available
    pub fn new(
        context: &'a QueryContext,
        registry: &'a dyn TypeRegistry,
        index_fields: Option<&'a BTreeSet<String>>,
    ) -> Self {
        Self {
            context,
            registry,
            index_fields,
        }
    }

    fn index_has(&self, field: &str) -> bool {
        self.index_fields.map_or(false, |fields| fields.contains(field))
    }

    /// Resolve a caller attribute name on the first requested type, or as a
    /// system attribute when the request names no type
    fn resolve(&self, attribute: &str) -> Option<ResolvedAttribute> {
        match self.context.entity_types.first() {
            Some(type_name) => self.registry.resolve_attribute(type_name, attribute),
            None => system_attribute(attribute),
        }
    }

    /// Sort key as a storage property; unresolved keys are dropped
    pub fn resolve_sort(&self, warnings: &mut Vec<String>) -> Option<SortSpec> {
        let attribute = self.context.sort_by.as_deref()?;
        match self.resolve(attribute) {
            Some(resolved) => Some(SortSpec::new(
                resolved.storage_property,
                self.context.sort_order,
            )),
            None => {
                let message = format!(
                    "sort attribute '{}' is not defined on the requested types; results are unsorted",
                    attribute
                );
                warn!("{}", message);
                warnings.push(message);
                None
            }
        }
    }

    fn index_sort(&self, sort: Option<SortSpec>, warnings: &mut Vec<String>) -> Option<SortSpec> {
        let sort = sort?;
        if self.index_has(&sort.property) {
            return Some(sort);
        }
        let message = format!(
            "sort attribute '{}' is not sortable in the index; results are in relevance order",
            sort.property
        );
        warn!("{}", message);
        warnings.push(message);
        None
    }

    fn relevance_weights(&self, warnings: &mut Vec<String>) -> BTreeMap<String, f64> {
        let mut weights = BTreeMap::new();
        for (attribute, weight) in &self.context.attribute_relevance {
            match self.resolve(attribute) {
                Some(resolved) => {
                    weights.insert(resolved.storage_property, *weight);
                }
                None => {
                    let message = format!(
                        "relevance attribute '{}' is not defined on the requested types; ignored",
                        attribute
                    );
                    warn!("{}", message);
                    warnings.push(message);
                }
            }
        }
        weights
    }

    fn type_values(&self) -> Vec<AttributeValue> {
        self.context
            .type_closure
            .iter()
            .map(|t| AttributeValue::from(t.as_str()))
            .collect()
    }

    fn type_predicate(&self) -> Predicate {
        if self.context.type_closure.is_empty() {
            Predicate::Always
        } else {
            Predicate::type_in(self.context.type_closure.clone())
        }
    }

    fn type_graph_clause(&self) -> Option<GraphClause> {
        if self.context.type_closure.is_empty() {
            return None;
        }
        Some(GraphClause::In {
            property: TYPE_NAME_PROPERTY_KEY.to_string(),
            values: self.type_values(),
        })
    }

    /// Type membership for the index, unless it is not filterable or its
    /// rendering is too long for the backend
    fn type_index_clause(&self) -> Option<IndexQuery> {
        if self.context.type_closure.is_empty() || !self.index_has(TYPE_NAME_PROPERTY_KEY) {
            return None;
        }
        let clause = IndexQuery::terms(TYPE_NAME_PROPERTY_KEY, self.type_values());
        let rendered = clause.to_query_string();
        if rendered.len() > self.context.config.max_type_query_length {
            debug!(
                "type clause is {} chars (max {}); filtering types in memory",
                rendered.len(),
                self.context.config.max_type_query_length
            );
            return None;
        }
        Some(clause)
    }

    fn active_graph_clause(&self) -> Option<GraphClause> {
        self.context.exclude_deleted.then(|| GraphClause::Has {
            property: STATE_PROPERTY_KEY.to_string(),
            op: Comparison::Eq,
            value: AttributeValue::from(EntityState::Active.as_str()),
        })
    }

    fn active_index_clause(&self) -> Option<IndexQuery> {
        (self.context.exclude_deleted && self.index_has(STATE_PROPERTY_KEY)).then(|| {
            IndexQuery::term(
                STATE_PROPERTY_KEY,
                Comparison::Eq,
                AttributeValue::from(EntityState::Active.as_str()),
            )
        })
    }

    fn index_template(
        &self,
        query: IndexQuery,
        sort: Option<SortSpec>,
        warnings: &mut Vec<String>,
    ) -> IndexSearchTemplate {
        IndexSearchTemplate {
            index_name: self.context.config.index_name.clone(),
            query,
            free_text: self.context.free_text.clone(),
            sort: self.index_sort(sort, warnings),
            min_score: self.context.min_score,
            attribute_weights: self.relevance_weights(warnings),
        }
    }

    /// Choose the plan for a stage
    ///
    /// `inline_classification` asks the stage to also apply the request's
    /// classification filter.
    pub fn select(
        &self,
        criteria: &CompiledCriteria,
        role: StageRole,
        inline_classification: bool,
    ) -> SearchResult<ExecutionPlan> {
        let mut warnings = Vec::new();

        if let Some(text) = self.context.free_text.as_deref() {
            if self.index_fields.is_none() {
                return Err(SearchError::unsatisfiable(
                    format!("query = {}", text),
                    "free-text search needs an index backend",
                ));
            }
        }

        let classification = self
            .context
            .classification
            .as_ref()
            .filter(|_| inline_classification);
        let classification_predicate = classification
            .map(|c| c.predicate())
            .unwrap_or(Predicate::Always);

        if role == StageRole::Filter {
            return Ok(self.filter_plan(criteria, classification_predicate, warnings));
        }

        let sort = self.resolve_sort(&mut warnings);

        if let Some(classification) = classification {
            if self.context.wants_relevance() {
                let message =
                    "relevance ranking is ignored when classifications are filtered inline"
                        .to_string();
                warn!("{}", message);
                warnings.push(message);
            }
            let graph = GraphQuery::new()
                .clauses_from(self.type_graph_clause())
                .clauses_from(classification.graph_clauses())
                .clauses_from(criteria.graph_clauses())
                .clauses_from(self.active_graph_clause())
                .with_order(sort);
            return Ok(ExecutionPlan {
                strategy: Strategy::GraphOnly { graph },
                residual: ResidualFilter {
                    type_membership: self.type_predicate(),
                    attributes: classification_predicate,
                    soft_delete: None,
                },
                rescope: None,
                native_exact: true,
                warnings,
            });
        }

        if self.index_fields.is_some() {
            let all_eligible = criteria.all_index_eligible();
            let use_index = if all_eligible {
                self.context.wants_relevance()
            } else {
                criteria.any_index_eligible() || self.context.free_text.is_some()
            };

            if use_index {
                let active = self.active_index_clause();
                let soft_delete = (self.context.exclude_deleted && active.is_none())
                    .then(|| Predicate::state_is(EntityState::Active));
                let type_clause = self.type_index_clause();
                let types_native = self.context.type_closure.is_empty() || type_clause.is_some();
                let query = IndexQuery::And(
                    type_clause
                        .into_iter()
                        .chain(std::iter::once(criteria.index_fragment()))
                        .chain(active)
                        .collect(),
                )
                .simplify();
                let index = self.index_template(query, sort, &mut warnings);
                let residual = ResidualFilter {
                    type_membership: self.type_predicate(),
                    attributes: criteria.double_check_predicate(),
                    soft_delete,
                };
                let native_exact = all_eligible
                    && types_native
                    && residual.attributes.is_always()
                    && residual.soft_delete.is_none();
                let strategy = if all_eligible {
                    Strategy::IndexOnly { index }
                } else {
                    Strategy::Hybrid {
                        index,
                        graph: GraphQuery::new()
                            .clauses_from(criteria.graph_clauses_outside_index()),
                    }
                };
                return Ok(ExecutionPlan {
                    strategy,
                    residual,
                    rescope: None,
                    native_exact,
                    warnings,
                });
            }
        } else if self.context.wants_relevance() {
            let message = "relevance ranking needs an index backend; ignored".to_string();
            warn!("{}", message);
            warnings.push(message);
        }

        let graph = GraphQuery::new()
            .clauses_from(self.type_graph_clause())
            .clauses_from(criteria.graph_clauses())
            .clauses_from(self.active_graph_clause())
            .with_order(sort);
        Ok(ExecutionPlan {
            strategy: Strategy::GraphOnly { graph },
            residual: ResidualFilter {
                type_membership: self.type_predicate(),
                ..ResidualFilter::default()
            },
            rescope: None,
            native_exact: true,
            warnings,
        })
    }

    /// Choose the plan for a classification stage
    ///
    /// Large classification sets are not sent to the graph; the trait
    /// predicate then runs in memory. Free-text requests never get here as
    /// a primary stage: the entity stage drives the index for them.
    pub fn select_classification(&self, role: StageRole) -> SearchResult<ExecutionPlan> {
        let classification = self.context.classification.as_ref().ok_or_else(|| {
            SearchError::invalid_filter("classification", "no classification was requested")
        })?;
        let mut warnings = Vec::new();

        if role == StageRole::Filter {
            return Ok(ExecutionPlan {
                strategy: Strategy::InMemory,
                residual: ResidualFilter {
                    attributes: classification.predicate(),
                    ..ResidualFilter::default()
                },
                rescope: None,
                native_exact: false,
                warnings,
            });
        }

        let native = classification.native_size() <= self.context.config.max_native_classification_set;
        if !native {
            debug!(
                "{} classifications exceed the native limit of {}; filtering in memory",
                classification.native_size(),
                self.context.config.max_native_classification_set
            );
        }
        let sort = self.resolve_sort(&mut warnings);
        let graph = GraphQuery::new()
            .clauses_from(self.type_graph_clause())
            .clauses_from(if native { classification.graph_clauses() } else { Vec::new() })
            .clauses_from(self.active_graph_clause())
            .with_order(sort);
        Ok(ExecutionPlan {
            strategy: Strategy::GraphOnly { graph },
            residual: ResidualFilter {
                type_membership: self.type_predicate(),
                attributes: if native {
                    Predicate::Always
                } else {
                    classification.predicate()
                },
                soft_delete: None,
            },
            rescope: None,
            native_exact: native,
            warnings,
        })
    }

    /// Plan for a stage that narrows upstream records; the upstream native
    /// query owns soft-delete exclusion
    fn filter_plan(
        &self,
        criteria: &CompiledCriteria,
        classification: Predicate,
        mut warnings: Vec<String>,
    ) -> ExecutionPlan {
        let sort = self.resolve_sort(&mut warnings);
        let wants_rescope = self.context.free_text.is_some() || sort.is_some();
        let rescope = if wants_rescope && self.index_has(GUID_PROPERTY_KEY) {
            Some(self.index_template(IndexQuery::MatchAll, sort, &mut warnings))
        } else {
            if wants_rescope {
                let message =
                    "ordering of filtered results needs an index keyed by guid; upstream order kept"
                        .to_string();
                warn!("{}", message);
                warnings.push(message);
            }
            None
        };
        ExecutionPlan {
            strategy: Strategy::InMemory,
            residual: ResidualFilter {
                type_membership: self.type_predicate(),
                attributes: criteria.predicate().and(classification),
                soft_delete: None,
            },
            rescope,
            native_exact: false,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::exec::TerminationSignal;
    use crate::model::{FilterCriteria, Operator, SearchRequest, SortOrder, StrategyKind};
    use crate::plan::FilterCompiler;
    use crate::registry::{
        AttributeDef, AttributeType, ClassificationTypeDef, EntityTypeDef, InMemoryTypeRegistry,
    };
    use std::sync::Arc;

    fn registry() -> InMemoryTypeRegistry {
        InMemoryTypeRegistry::new()
            .with_entity_type(
                EntityTypeDef::new("Table")
                    .with_attribute(AttributeDef::new("name", AttributeType::String))
                    .with_attribute(AttributeDef::new("rowCount", AttributeType::Number))
                    .with_attribute(AttributeDef::new("comment", AttributeType::String).unindexed()),
            )
            .and_then(|r| r.with_classification_type(ClassificationTypeDef::new("PII")))
            .unwrap()
    }

    fn fields() -> BTreeSet<String> {
        ["__guid", "__typeName", "__state", "Table.name", "Table.rowCount"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn plan_for(
        request: SearchRequest,
        index_fields: Option<&BTreeSet<String>>,
        role: StageRole,
        inline_classification: bool,
    ) -> SearchResult<ExecutionPlan> {
        let registry = registry();
        let context = QueryContext::build(
            &request,
            &registry,
            Arc::new(SearchConfig::default()),
            TerminationSignal::new(),
        )?;
        let compiled = FilterCompiler::new(&registry, &context.entity_types, index_fields)
            .compile(context.criteria.as_ref())?;
        StrategySelector::new(&context, &registry, index_fields).select(
            &compiled,
            role,
            inline_classification,
        )
    }

    #[test]
    fn test_eligible_filter_without_ranking_uses_graph() {
        let fields = fields();
        let request = SearchRequest::for_type("Table")
            .with_filter(FilterCriteria::attribute("rowCount", Operator::Gt, 10));
        let plan = plan_for(request, Some(&fields), StageRole::Primary, false).unwrap();
        assert_eq!(plan.kind(), StrategyKind::GraphOnly);
    }

    #[test]
    fn test_free_text_with_eligible_filter_is_index_only() {
        let fields = fields();
        let request = SearchRequest::for_type("Table")
            .with_query("orders")
            .exclude_deleted()
            .with_filter(FilterCriteria::attribute("rowCount", Operator::Gt, 10));
        let plan = plan_for(request, Some(&fields), StageRole::Primary, false).unwrap();
        assert_eq!(plan.kind(), StrategyKind::IndexOnly);
        // deleted records are excluded natively, never twice
        assert!(plan.residual.soft_delete.is_none());
        assert!(plan.native_exact);
        let wire = plan.strategy.index().unwrap().request(0, 10).wire_query();
        assert!(wire.contains("__state"), "{}", wire);
    }

    #[test]
    fn test_mixed_filter_is_hybrid() {
        let fields = fields();
        let request = SearchRequest::for_type("Table").with_filter(FilterCriteria::and(vec![
            FilterCriteria::attribute("rowCount", Operator::Gt, 10),
            FilterCriteria::attribute("comment", Operator::Contains, "gold"),
        ]));
        let plan = plan_for(request, Some(&fields), StageRole::Primary, false).unwrap();
        assert_eq!(plan.kind(), StrategyKind::Hybrid);
        assert_eq!(plan.strategy.graph().unwrap().clauses().len(), 1);
        assert!(!plan.native_exact);
    }

    #[test]
    fn test_free_text_without_index_is_unsatisfiable() {
        let request = SearchRequest::for_type("Table").with_query("orders");
        let err = plan_for(request, None, StageRole::Primary, false).unwrap_err();
        assert!(matches!(err, SearchError::PlanUnsatisfiable { .. }));
    }

    #[test]
    fn test_inline_classification_runs_on_graph() {
        let fields = fields();
        let request = SearchRequest::for_type("Table")
            .with_classification("PII")
            .exclude_deleted();
        let plan = plan_for(request, Some(&fields), StageRole::Primary, true).unwrap();
        assert_eq!(plan.kind(), StrategyKind::GraphOnly);
        assert!(!plan.residual.attributes.is_always());
        assert!(plan.residual.soft_delete.is_none());
    }

    #[test]
    fn test_filter_stage_runs_in_memory() {
        let fields = fields();
        let request = SearchRequest::for_type("Table")
            .exclude_deleted()
            .sorted_by("name", SortOrder::Descending);
        let plan = plan_for(request, Some(&fields), StageRole::Filter, false).unwrap();
        assert_eq!(plan.kind(), StrategyKind::InMemory);
        assert!(plan.residual.soft_delete.is_none());
        let rescope = plan.rescope.unwrap();
        assert_eq!(rescope.sort.unwrap().property, "Table.name");
    }

    #[test]
    fn test_unknown_sort_key_is_a_warning() {
        let request = SearchRequest::for_type("Table").sorted_by("colour", SortOrder::Ascending);
        let plan = plan_for(request, None, StageRole::Primary, false).unwrap();
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.strategy.graph().unwrap().ordering().is_none());
    }

    #[test]
    fn test_large_classification_set_filters_in_memory() {
        let registry = registry();
        let context = QueryContext::build(
            &SearchRequest::for_classification("PII").exclude_deleted(),
            &registry,
            Arc::new(SearchConfig::default().with_max_native_classification_set(0)),
            TerminationSignal::new(),
        )
        .unwrap();
        let selector = StrategySelector::new(&context, &registry, None);

        let plan = selector.select_classification(StageRole::Primary).unwrap();
        assert_eq!(plan.kind(), StrategyKind::GraphOnly);
        assert!(!plan.residual.attributes.is_always());
        assert!(!plan.native_exact);
        // only the active-state clause goes to the graph
        assert_eq!(plan.strategy.graph().unwrap().clauses().len(), 1);

        let filter = selector.select_classification(StageRole::Filter).unwrap();
        assert_eq!(filter.kind(), StrategyKind::InMemory);
    }

    #[test]
    fn test_long_type_clause_stays_in_memory() {
        let registry = registry();
        let fields = fields();
        let context = QueryContext::build(
            &SearchRequest::for_type("Table").with_query("orders"),
            &registry,
            Arc::new(SearchConfig::default().with_max_type_query_length(5)),
            TerminationSignal::new(),
        )
        .unwrap();
        let plan = StrategySelector::new(&context, &registry, Some(&fields))
            .select(&CompiledCriteria::default(), StageRole::Primary, false)
            .unwrap();
        let index = plan.strategy.index().unwrap();
        assert!(index.query.is_match_all());
        assert!(!plan.residual.type_membership.is_always());
        assert!(!plan.native_exact);
    }
}
