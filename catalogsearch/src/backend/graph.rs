// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph backend contract and query builder

use super::{BackendError, SortSpec};
use crate::model::{AttributeValue, EntityRecord, SortOrder};
use crate::predicate::Comparison;
use async_trait::async_trait;
use std::fmt;

/// One constraint of a graph query
#[derive(Debug, Clone, PartialEq)]
pub enum GraphClause {
    Has {
        property: String,
        op: Comparison,
        value: AttributeValue,
    },
    In {
        property: String,
        values: Vec<AttributeValue>,
    },
    /// Any of the branches holds
    Or(Vec<GraphQuery>),
}

/// Conjunction of clauses with optional ordering
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphQuery {
    clauses: Vec<GraphClause>,
    order: Option<SortSpec>,
}

impl GraphQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(mut self, property: impl Into<String>, op: Comparison, value: AttributeValue) -> Self {
        self.clauses.push(GraphClause::Has {
            property: property.into(),
            op,
            value,
        });
        self
    }

    pub fn in_set(mut self, property: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        self.clauses.push(GraphClause::In {
            property: property.into(),
            values,
        });
        self
    }

    pub fn or(mut self, branches: Vec<GraphQuery>) -> Self {
        self.clauses.push(GraphClause::Or(branches));
        self
    }

    pub fn clause(mut self, clause: GraphClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses_from<I: IntoIterator<Item = GraphClause>>(mut self, clauses: I) -> Self {
        self.clauses.extend(clauses);
        self
    }

    pub fn order_by(mut self, property: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some(SortSpec::new(property, order));
        self
    }

    pub fn with_order(mut self, order: Option<SortSpec>) -> Self {
        self.order = order;
        self
    }

    pub fn clauses(&self) -> &[GraphClause] {
        &self.clauses
    }

    pub fn ordering(&self) -> Option<&SortSpec> {
        self.order.as_ref()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }
}

fn step_name(op: Comparison) -> &'static str {
    match op {
        Comparison::Eq => "eq",
        Comparison::Neq => "neq",
        Comparison::Lt => "lt",
        Comparison::Lte => "lte",
        Comparison::Gt => "gt",
        Comparison::Gte => "gte",
        Comparison::StartsWith => "startingWith",
        Comparison::EndsWith => "endingWith",
        Comparison::Contains => "containing",
        Comparison::NotContains => "notContaining",
        Comparison::Like => "like",
    }
}

fn write_clause(f: &mut fmt::Formatter<'_>, clause: &GraphClause) -> fmt::Result {
    match clause {
        GraphClause::Has {
            property,
            op,
            value,
        } => {
            write!(f, ".has('{}', {}({}))", property, step_name(*op), value)
        }
        GraphClause::In { property, values } => {
            write!(f, ".has('{}', within(", property)?;
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, "))")
        }
        GraphClause::Or(branches) => {
            write!(f, ".or(")?;
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "__")?;
                for inner in &branch.clauses {
                    write_clause(f, inner)?;
                }
            }
            write!(f, ")")
        }
    }
}

impl fmt::Display for GraphQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g.V()")?;
        for clause in &self.clauses {
            write_clause(f, clause)?;
        }
        if let Some(order) = &self.order {
            let dir = match order.order {
                SortOrder::Ascending => "asc",
                SortOrder::Descending => "desc",
            };
            write!(f, ".order().by('{}', {})", order.property, dir)?;
        }
        Ok(())
    }
}

/// Property-graph store holding the authoritative entity records
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Matching vertices in query order, skipping `offset` and returning at
    /// most `limit`
    async fn vertices(
        &self,
        query: &GraphQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, BackendError>;

    /// Ids of every matching vertex
    async fn vertex_ids(
        &self,
        query: &GraphQuery,
    ) -> Result<Box<dyn Iterator<Item = String> + Send>, BackendError>;
}
