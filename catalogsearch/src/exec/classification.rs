// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Classification search stage

use super::context::QueryContext;
use super::counter::ResultCounter;
use super::perf::PerfTracer;
use super::processor::{filter_next, ProcessorOutput, SearchBackends, SearchProcessor};
use super::window::{Batch, BatchSource, ResultWindow};
use crate::backend::{bounded, BackendKind};
use crate::error::SearchResult;
use crate::model::{EntityRecord, ResultCount};
use crate::plan::{ExecutionPlan, StageRole, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

/// Stage selecting entities by classification
///
/// As the primary stage it queries the graph; as a filter it checks the
/// classification of upstream records in memory.
pub struct ClassificationSearchProcessor {
    context: Arc<QueryContext>,
    backends: SearchBackends,
    plan: ExecutionPlan,
    role: StageRole,
    next: Option<Box<dyn SearchProcessor>>,
}

impl ClassificationSearchProcessor {
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
}

#[async_trait]
impl BatchSource for ClassificationSearchProcessor {
    async fn fetch(&self, offset: usize, limit: usize) -> SearchResult<Batch> {
        let _perf = PerfTracer::start("classification:fetch");
        let graph = match &self.plan.strategy {
            Strategy::GraphOnly { graph } => graph,
            _ => return Ok(Batch::default()),
        };
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

    async fn filter_batch(&self, records: &mut Vec<EntityRecord>) -> SearchResult<()> {
        self.plan.residual.apply(records);
        filter_next(self.next(), records).await
    }
}

#[async_trait]
impl SearchProcessor for ClassificationSearchProcessor {
    fn name(&self) -> &'static str {
        "classification"
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
        let _perf = PerfTracer::start("classification:execute");
        ResultWindow::new(
            self.context.limit,
            self.context.offset,
            self.plan.backend_applies_offset(self.next.is_some()),
        )
        .run(self, &self.context.signal)
        .await
    }

    async fn filter(&self, records: &mut Vec<EntityRecord>) -> SearchResult<()> {
        self.plan.residual.apply(records);
        filter_next(self.next(), records).await
    }

    async fn result_count(&self) -> SearchResult<ResultCount> {
        ResultCounter::new(&self.backends, self.context.config.backend_timeout)
            .count(&self.plan)
            .await
    }
}
