// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Chain link contract shared by search stages

use super::termination::TerminationReason;
use crate::backend::{GraphBackend, IndexBackend};
use crate::error::SearchResult;
use crate::model::{EntityRecord, ResultCount};
use crate::plan::{ExecutionPlan, StageRole};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Backend handles injected into every stage
#[derive(Clone)]
pub struct SearchBackends {
    pub graph: Arc<dyn GraphBackend>,
    pub index: Option<Arc<dyn IndexBackend>>,
}

impl SearchBackends {
    pub fn new(graph: Arc<dyn GraphBackend>) -> Self {
        Self { graph, index: None }
    }

    pub fn with_index(mut self, index: Arc<dyn IndexBackend>) -> Self {
        self.index = Some(index);
        self
    }

    /// Fields the index filters on natively, if there is an index
    pub fn index_fields(&self) -> Option<Arc<BTreeSet<String>>> {
        self.index.as_ref().map(|index| index.filterable_fields())
    }
}

/// One page produced by a stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorOutput {
    pub records: Vec<EntityRecord>,
    /// The primary backend ran out of matching records
    pub is_last_page: bool,
    pub terminated: Option<TerminationReason>,
}

/// A stage of a search
///
/// The first stage of a chain produces records with [`execute`]; every later
/// stage only narrows them through [`filter`], which never adds records.
///
/// [`execute`]: SearchProcessor::execute
/// [`filter`]: SearchProcessor::filter
#[async_trait]
pub trait SearchProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn role(&self) -> StageRole;

    fn plan(&self) -> &ExecutionPlan;

    fn next(&self) -> Option<&dyn SearchProcessor>;

    fn set_next(&mut self, next: Box<dyn SearchProcessor>);

    /// Produce one page of results, honouring the request's limit and offset
    async fn execute(&self) -> SearchResult<ProcessorOutput>;

    /// Narrow records produced upstream, then hand them downstream
    async fn filter(&self, records: &mut Vec<EntityRecord>) -> SearchResult<()>;

    /// Total matches of this stage's native query
    async fn result_count(&self) -> SearchResult<ResultCount>;
}

/// Forward records to the next stage, if any
pub async fn filter_next(
    next: Option<&dyn SearchProcessor>,
    records: &mut Vec<EntityRecord>,
) -> SearchResult<()> {
    match next {
        Some(stage) if !records.is_empty() => stage.filter(records).await,
        _ => Ok(()),
    }
}
