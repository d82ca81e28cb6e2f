// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Entity search stage
//!
//! Runs the native part of an [`ExecutionPlan`] against the graph, the index
//! or both, and the residual in memory. Index hits only contribute guids and
//! ranking; records always come from the graph.

use super::context::QueryContext;
use super::counter::ResultCounter;
use super::perf::PerfTracer;
use super::processor::{filter_next, ProcessorOutput, SearchBackends, SearchProcessor};
use super::window::{Batch, BatchSource, ResultWindow};
use crate::backend::{bounded, BackendKind, GraphQuery, IndexBackend};
use crate::error::{SearchError, SearchResult};
use crate::model::{AttributeValue, EntityRecord, ResultCount, GUID_PROPERTY_KEY};
use crate::plan::{ExecutionPlan, IndexSearchTemplate, StageRole, Strategy};
use async_trait::async_trait;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;

/// Stage searching entities of the requested types
pub struct EntitySearchProcessor {
    context: Arc<QueryContext>,
    backends: SearchBackends,
    plan: ExecutionPlan,
    role: StageRole,
    next: Option<Box<dyn SearchProcessor>>,
}

impl EntitySearchProcessor {
    pub fn new(
        context: Arc<QueryContext>,
        backends: SearchBackends,
        plan: ExecutionPlan,
        role: StageRole,
    ) -> Self {
        Self {
            context,
            backends,
            plan,
            role,
            next: None,
        }
    }

    fn index(&self) -> SearchResult<&Arc<dyn IndexBackend>> {
        self.backends.index.as_ref().ok_or_else(|| {
            SearchError::unsatisfiable(
                self.context.free_text.as_deref().unwrap_or("index"),
                "plan needs an index backend but none is configured",
            )
        })
    }

    /// Page of index hits resolved to graph records in hit order
    async fn fetch_via_index(
        &self,
        template: &IndexSearchTemplate,
        graph: Option<&GraphQuery>,
        offset: usize,
        limit: usize,
    ) -> SearchResult<Batch> {
        let timeout = self.context.config.backend_timeout;
        let request = template.request(offset, limit);
        let response = bounded(BackendKind::Index, timeout, self.index()?.search(&request)).await?;
        let raw_len = response.hits.len();
        let guids: Vec<String> = response
            .hits
            .into_iter()
            .map(|hit| hit.record.guid)
            .collect();
        if guids.is_empty() {
            return Ok(Batch {
                records: Vec::new(),
                raw_len,
            });
        }

        let query = graph.cloned().unwrap_or_default().in_set(
            GUID_PROPERTY_KEY,
            guids.iter().map(|g| AttributeValue::from(g.as_str())).collect(),
        );
        let mut records = bounded(
            BackendKind::Graph,
            timeout,
            self.backends.graph.vertices(&query, 0, guids.len()),
        )
        .await?;

        let position: HashMap<&str, usize> = guids
            .iter()
            .enumerate()
            .map(|(i, guid)| (guid.as_str(), i))
            .collect();
        records.sort_by_key(|r| position.get(r.guid.as_str()).copied().unwrap_or(usize::MAX));
        trace!(
            "{} index hits resolved to {} graph records",
            raw_len,
            records.len()
        );
        Ok(Batch { records, raw_len })
    }

    /// Replace `records` with the index's ranking of exactly those guids
    async fn rescope(
        &self,
        template: &IndexSearchTemplate,
        records: &mut Vec<EntityRecord>,
    ) -> SearchResult<()> {
        let guids: Vec<String> = records.iter().map(|r| r.guid.clone()).collect();
        let response = bounded(
            BackendKind::Index,
            self.context.config.backend_timeout,
            self.index()?.search(&template.scoped_to(&guids)),
        )
        .await?;
        let mut by_guid: HashMap<String, EntityRecord> =
            records.drain(..).map(|r| (r.guid.clone(), r)).collect();
        records.extend(
            response
                .hits
                .iter()
                .filter_map(|hit| by_guid.remove(&hit.record.guid)),
        );
        debug!("rescoped {} records to {} ranked hits", guids.len(), records.len());
        Ok(())
    }
}

#[async_trait]
impl BatchSource for EntitySearchProcessor {
    async fn fetch(&self, offset: usize, limit: usize) -> SearchResult<Batch> {
        let _perf = PerfTracer::start(format!("entity:fetch:{}", self.plan.kind()));
        match &self.plan.strategy {
            Strategy::IndexOnly { index } => self.fetch_via_index(index, None, offset, limit).await,
            Strategy::Hybrid { index, graph } => {
                self.fetch_via_index(index, Some(graph), offset, limit).await
            }
            Strategy::GraphOnly { graph } => {
                let records = bounded(
                    BackendKind::Graph,
                    self.context.config.backend_timeout,
                    self.backends.graph.vertices(graph, offset, limit),
                )
                .await?;
                Ok(Batch {
                    raw_len: records.len(),
                    records,
                })
            }
            Strategy::InMemory => Ok(Batch::default()),
        }
    }

    async fn filter_batch(&self, records: &mut Vec<EntityRecord>) -> SearchResult<()> {
        self.plan.residual.apply(records);
        filter_next(self.next(), records).await
    }
}

#[async_trait]
impl SearchProcessor for EntitySearchProcessor {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn role(&self) -> StageRole {
        self.role
    }

    fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    fn next(&self) -> Option<&dyn SearchProcessor> {
        self.next.as_deref()
    }

    fn set_next(&mut self, next: Box<dyn SearchProcessor>) {
        self.next = Some(next);
    }

    async fn execute(&self) -> SearchResult<ProcessorOutput> {
        let _perf = PerfTracer::start("entity:execute");
        let window = ResultWindow::new(
            self.context.limit,
            self.context.offset,
            self.plan.backend_applies_offset(self.next.is_some()),
        );
        window.run(self, &self.context.signal).await
    }

    async fn filter(&self, records: &mut Vec<EntityRecord>) -> SearchResult<()> {
        let _perf = PerfTracer::start("entity:filter");
        self.plan.residual.apply(records);
        if let Some(template) = &self.plan.rescope {
            if !records.is_empty() {
                self.rescope(template, records).await?;
            }
        }
        filter_next(self.next(), records).await
    }

    async fn result_count(&self) -> SearchResult<ResultCount> {
        ResultCounter::new(&self.backends, self.context.config.backend_timeout)
            .count(&self.plan)
            .await
    }
}
