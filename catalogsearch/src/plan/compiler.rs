// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Filter compilation
//!
//! A caller's criteria tree is split at top-level AND into conjuncts. Each
//! conjunct is compiled three ways at once: an in-memory predicate, graph
//! clauses, and (when every part of it is index-expressible) an index query.
//! All three describe the same set of records; the index form may be looser
//! on analyzed string fields, which `exact` records.

use crate::backend::{GraphClause, GraphQuery, IndexQuery};
use crate::error::{SearchError, SearchResult};
use crate::model::{
    AttributeValue, Condition, CriteriaNode, FilterCriteria, Operator, TYPE_NAME_PROPERTY_KEY,
};
use crate::predicate::{Comparison, LikePattern, Predicate};
use crate::registry::{AttributeType, ResolvedAttribute, TypeRegistry};
use log::trace;
use std::collections::BTreeSet;

/// One top-level conjunct of a compiled filter
#[derive(Debug, Clone)]
pub struct CompiledConjunct {
    /// Caller-facing rendering of the clause
    pub clause: String,
    pub predicate: Predicate,
    pub graph: Vec<GraphClause>,
    /// Index form, present only when the whole conjunct is index-eligible
    pub native: Option<IndexQuery>,
    /// The index form matches exactly the records the predicate accepts
    pub exact: bool,
}

impl CompiledConjunct {
    pub fn is_index_eligible(&self) -> bool {
        self.native.is_some()
    }

    /// Eligible but looser in the index than in memory
    fn needs_double_check(&self) -> bool {
        self.native.is_some() && !self.exact
    }
}

/// Compiled entity filter
#[derive(Debug, Clone, Default)]
pub struct CompiledCriteria {
    conjuncts: Vec<CompiledConjunct>,
}

impl CompiledCriteria {
    pub fn conjuncts(&self) -> &[CompiledConjunct] {
        &self.conjuncts
    }

    pub fn is_empty(&self) -> bool {
        self.conjuncts.is_empty()
    }

    /// True for an empty filter
    pub fn all_index_eligible(&self) -> bool {
        self.conjuncts.iter().all(CompiledConjunct::is_index_eligible)
    }

    pub fn any_index_eligible(&self) -> bool {
        self.conjuncts.iter().any(CompiledConjunct::is_index_eligible)
    }

    /// The full filter as an in-memory predicate
    pub fn predicate(&self) -> Predicate {
        Predicate::all(self.conjuncts.iter().map(|c| c.predicate.clone()))
    }

    /// The full filter as graph clauses
    pub fn graph_clauses(&self) -> Vec<GraphClause> {
        self.conjuncts
            .iter()
            .flat_map(|c| c.graph.iter().cloned())
            .collect()
    }

    /// Graph clauses for the conjuncts the index cannot evaluate
    pub fn graph_clauses_outside_index(&self) -> Vec<GraphClause> {
        self.conjuncts
            .iter()
            .filter(|c| !c.is_index_eligible())
            .flat_map(|c| c.graph.iter().cloned())
            .collect()
    }

    /// Conjunction of the index-eligible conjuncts
    pub fn index_fragment(&self) -> IndexQuery {
        IndexQuery::And(
            self.conjuncts
                .iter()
                .filter_map(|c| c.native.clone())
                .collect(),
        )
        .simplify()
    }

    /// Predicate re-checking conjuncts whose index form is looser than exact
    pub fn double_check_predicate(&self) -> Predicate {
        Predicate::all(
            self.conjuncts
                .iter()
                .filter(|c| c.needs_double_check())
                .map(|c| c.predicate.clone()),
        )
    }
}

/// The three compiled forms of one criteria node
struct CompiledNode {
    predicate: Predicate,
    graph: Vec<GraphClause>,
    native: Option<IndexQuery>,
    exact: bool,
}

/// Coerced operand of a leaf
enum Operand {
    Unary,
    Single(AttributeValue),
    List(Vec<AttributeValue>),
    Range(AttributeValue, AttributeValue),
    Pattern(LikePattern),
}

fn comparison_for(operator: Operator) -> Option<Comparison> {
    let op = match operator {
        Operator::Eq => Comparison::Eq,
        Operator::Neq => Comparison::Neq,
        Operator::Lt => Comparison::Lt,
        Operator::Lte => Comparison::Lte,
        Operator::Gt => Comparison::Gt,
        Operator::Gte => Comparison::Gte,
        Operator::StartsWith => Comparison::StartsWith,
        Operator::EndsWith => Comparison::EndsWith,
        Operator::Contains => Comparison::Contains,
        Operator::NotContains => Comparison::NotContains,
        Operator::Like => Comparison::Like,
        Operator::In | Operator::IsNull | Operator::NotNull | Operator::TimeRange => return None,
    };
    Some(op)
}

/// Split a list operand the way callers write it: an array, or a comma
/// separated string
fn list_items(value: &AttributeValue) -> Vec<AttributeValue> {
    match value {
        AttributeValue::Array(items) => items.clone(),
        AttributeValue::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AttributeValue::from)
            .collect(),
        other => vec![other.clone()],
    }
}

/// Compiles caller criteria against the requested entity types
pub struct FilterCompiler<'a> {
    registry: &'a dyn TypeRegistry,
    entity_types: &'a [String],
    index_fields: Option<&'a BTreeSet<String>>,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(
        registry: &'a dyn TypeRegistry,
        entity_types: &'a [String],
        index_fields: Option<&'a BTreeSet<String>>,
    ) -> Self {
        Self {
            registry,
            entity_types,
            index_fields,
        }
    }

    /// Compile a criteria tree; `None` compiles to an empty filter
    pub fn compile(&self, criteria: Option<&FilterCriteria>) -> SearchResult<CompiledCriteria> {
        let mut conjuncts = Vec::new();
        if let Some(criteria) = criteria {
            let mut tops = Vec::new();
            collect_conjuncts(criteria, &mut tops)?;
            for top in tops {
                if let Some(node) = self.compile_node(top)? {
                    conjuncts.push(CompiledConjunct {
                        clause: top.to_string(),
                        predicate: node.predicate,
                        graph: node.graph,
                        native: node.native,
                        exact: node.exact,
                    });
                }
            }
        }
        trace!(
            "compiled {} conjuncts ({} index-eligible)",
            conjuncts.len(),
            conjuncts.iter().filter(|c| c.is_index_eligible()).count()
        );
        Ok(CompiledCriteria { conjuncts })
    }

    fn compile_node(&self, criteria: &FilterCriteria) -> SearchResult<Option<CompiledNode>> {
        match criteria.node()? {
            CriteriaNode::Group {
                condition,
                children,
            } => {
                let mut compiled = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(node) = self.compile_node(child)? {
                        compiled.push(node);
                    }
                }
                Ok(combine(condition, compiled))
            }
            CriteriaNode::Leaf {
                attribute,
                operator,
                value,
            } => self
                .compile_leaf(criteria, attribute, operator, value)
                .map(Some),
        }
    }

    fn compile_leaf(
        &self,
        criteria: &FilterCriteria,
        attribute: &str,
        operator: Operator,
        value: Option<&AttributeValue>,
    ) -> SearchResult<CompiledNode> {
        let clause = criteria.to_string();
        if self.entity_types.is_empty() {
            return Err(SearchError::invalid_filter(
                clause,
                "attribute filters require an entity type",
            ));
        }

        let mut resolved: Vec<(&String, ResolvedAttribute)> = Vec::new();
        for type_name in self.entity_types {
            match self.registry.resolve_attribute(type_name, attribute) {
                Some(attr) => resolved.push((type_name, attr)),
                None => {
                    return Err(SearchError::invalid_filter(
                        clause,
                        format!("unknown attribute '{}' for type '{}'", attribute, type_name),
                    ))
                }
            }
        }

        let attribute_type = resolved[0].1.attribute_type;
        if resolved.iter().any(|(_, a)| a.attribute_type != attribute_type) {
            return Err(SearchError::unsatisfiable(
                clause,
                format!(
                    "attribute '{}' has conflicting types across the requested entity types",
                    attribute
                ),
            ));
        }
        if !attribute_type.supports(operator) {
            return Err(SearchError::unsatisfiable(
                clause,
                format!(
                    "operator '{}' is not supported on {} attribute '{}'",
                    operator, attribute_type, attribute
                ),
            ));
        }

        let operand = coerce_operand(&clause, attribute_type, operator, value)?;

        let mut properties: Vec<&str> = Vec::new();
        for (_, attr) in &resolved {
            if !properties.contains(&attr.storage_property.as_str()) {
                properties.push(&attr.storage_property);
            }
        }

        let exact = !attribute_type.is_textual()
            || matches!(operator, Operator::IsNull | Operator::NotNull);

        if let [property] = properties.as_slice() {
            let mut node = leaf_node(property, operator, &operand, exact);
            let indexable = resolved.iter().all(|(_, a)| a.indexed)
                && self
                    .index_fields
                    .map_or(false, |fields| fields.contains(*property));
            if !indexable {
                node.native = None;
            }
            return Ok(node);
        }

        // The attribute resolves to different storage properties on
        // different requested types: test each type against its own property.
        let mut predicates = Vec::new();
        let mut branches = Vec::new();
        for property in properties {
            let mut types = BTreeSet::new();
            for (type_name, attr) in &resolved {
                if attr.storage_property == property {
                    types.extend(self.registry.entity_subtypes(type_name));
                }
            }
            let node = leaf_node(property, operator, &operand, exact);
            let type_values: Vec<AttributeValue> =
                types.iter().map(|t| AttributeValue::from(t.as_str())).collect();
            predicates.push(Predicate::type_in(types).and(node.predicate));
            branches.push(
                GraphQuery::new()
                    .in_set(TYPE_NAME_PROPERTY_KEY, type_values)
                    .clauses_from(node.graph),
            );
        }
        Ok(CompiledNode {
            predicate: Predicate::any(predicates),
            graph: vec![GraphClause::Or(branches)],
            native: None,
            exact,
        })
    }
}

/// Flatten top-level ANDs into the list of conjuncts
fn collect_conjuncts<'c>(
    criteria: &'c FilterCriteria,
    out: &mut Vec<&'c FilterCriteria>,
) -> SearchResult<()> {
    match criteria.node()? {
        CriteriaNode::Group {
            condition: Condition::And,
            children,
        } => {
            for child in children {
                collect_conjuncts(child, out)?;
            }
        }
        _ => out.push(criteria),
    }
    Ok(())
}

fn combine(condition: Condition, mut nodes: Vec<CompiledNode>) -> Option<CompiledNode> {
    if nodes.len() <= 1 {
        return nodes.pop();
    }
    let exact = nodes.iter().all(|n| n.exact);
    let native = nodes
        .iter()
        .map(|n| n.native.clone())
        .collect::<Option<Vec<_>>>();

    let node = match condition {
        Condition::And => CompiledNode {
            native: native.map(IndexQuery::And),
            graph: nodes.iter().flat_map(|n| n.graph.iter().cloned()).collect(),
            predicate: Predicate::all(nodes.into_iter().map(|n| n.predicate)),
            exact,
        },
        Condition::Or => CompiledNode {
            native: native.map(IndexQuery::Or),
            graph: vec![GraphClause::Or(
                nodes
                    .iter()
                    .map(|n| GraphQuery::new().clauses_from(n.graph.iter().cloned()))
                    .collect(),
            )],
            predicate: Predicate::any(nodes.into_iter().map(|n| n.predicate)),
            exact,
        },
    };
    Some(node)
}

fn coerce_operand(
    clause: &str,
    attribute_type: AttributeType,
    operator: Operator,
    value: Option<&AttributeValue>,
) -> SearchResult<Operand> {
    let invalid = |reason: String| SearchError::invalid_filter(clause, reason);
    let value = match value {
        Some(v) if operator.requires_value() => v,
        _ => return Ok(Operand::Unary),
    };

    match operator {
        Operator::In => {
            let items = list_items(value)
                .iter()
                .map(|item| attribute_type.coerce(item).map_err(&invalid))
                .collect::<SearchResult<Vec<_>>>()?;
            if items.is_empty() {
                return Err(invalid("'in' needs at least one value".to_string()));
            }
            Ok(Operand::List(items))
        }
        Operator::TimeRange => {
            let bounds = list_items(value);
            if bounds.len() != 2 {
                return Err(invalid(
                    "'timerange' needs exactly two values: start,end".to_string(),
                ));
            }
            let start = attribute_type.coerce(&bounds[0]).map_err(&invalid)?;
            let end = attribute_type.coerce(&bounds[1]).map_err(&invalid)?;
            if start.compare(&end) == Some(std::cmp::Ordering::Greater) {
                return Err(invalid("'timerange' start is after its end".to_string()));
            }
            Ok(Operand::Range(start, end))
        }
        Operator::Like => match value {
            AttributeValue::String(pattern) => LikePattern::compile(pattern)
                .map(Operand::Pattern)
                .map_err(|e| invalid(format!("invalid pattern: {}", e))),
            other => Err(invalid(format!(
                "'like' needs a string pattern, got {}",
                other.type_name()
            ))),
        },
        _ => {
            if matches!(value, AttributeValue::Array(_)) {
                return Err(invalid(format!(
                    "operator '{}' needs a single value",
                    operator
                )));
            }
            attribute_type
                .coerce(value)
                .map(Operand::Single)
                .map_err(invalid)
        }
    }
}

fn leaf_node(property: &str, operator: Operator, operand: &Operand, exact: bool) -> CompiledNode {
    let (predicate, graph, native) = match (operator, operand) {
        (Operator::IsNull, _) => (
            Predicate::is_null(property),
            vec![has(property, Comparison::Eq, AttributeValue::Null)],
            Some(IndexQuery::Missing(property.to_string())),
        ),
        (Operator::NotNull, _) => (
            Predicate::not_null(property),
            vec![has(property, Comparison::Neq, AttributeValue::Null)],
            Some(IndexQuery::Exists(property.to_string())),
        ),
        (_, Operand::List(values)) => (
            Predicate::in_set(property, values.clone()),
            vec![GraphClause::In {
                property: property.to_string(),
                values: values.clone(),
            }],
            Some(IndexQuery::terms(property, values.clone())),
        ),
        (_, Operand::Range(start, end)) => (
            Predicate::compare(property, Comparison::Gte, start.clone())
                .and(Predicate::compare(property, Comparison::Lte, end.clone())),
            vec![
                has(property, Comparison::Gte, start.clone()),
                has(property, Comparison::Lte, end.clone()),
            ],
            Some(IndexQuery::And(vec![
                IndexQuery::term(property, Comparison::Gte, start.clone()),
                IndexQuery::term(property, Comparison::Lte, end.clone()),
            ])),
        ),
        (_, Operand::Pattern(pattern)) => {
            let raw = AttributeValue::from(pattern.pattern());
            (
                Predicate::like(property, pattern.clone()),
                vec![has(property, Comparison::Like, raw.clone())],
                Some(IndexQuery::term(property, Comparison::Like, raw)),
            )
        }
        (operator, Operand::Single(value)) => match comparison_for(operator) {
            Some(op) => {
                // The index cannot express negative string conditions
                let native = match op {
                    Comparison::Neq | Comparison::NotContains => None,
                    _ => Some(IndexQuery::term(property, op, value.clone())),
                };
                (
                    Predicate::compare(property, op, value.clone()),
                    vec![has(property, op, value.clone())],
                    native,
                )
            }
            None => (Predicate::Always, Vec::new(), None),
        },
        (_, Operand::Unary) => (Predicate::Always, Vec::new(), None),
    };
    CompiledNode {
        predicate,
        graph,
        native,
        exact,
    }
}

fn has(property: &str, op: Comparison, value: AttributeValue) -> GraphClause {
    GraphClause::Has {
        property: property.to_string(),
        op,
        value,
    }
}
