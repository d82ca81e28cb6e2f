// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result counting

use super::perf::PerfTracer;
use super::processor::SearchBackends;
use crate::backend::{bounded, BackendKind};
use crate::error::SearchResult;
use crate::model::ResultCount;
use crate::plan::{ExecutionPlan, Strategy};
use log::debug;
use std::time::Duration;

/// Counts the matches of a stage's native query
///
/// Plans that use the index report the index total; graph-only plans count
/// the graph's vertex ids. Residual predicates are not reflected in either.
pub struct ResultCounter<'a> {
    backends: &'a SearchBackends,
    timeout: Duration,
}

impl<'a> ResultCounter<'a> {
    pub fn new(backends: &'a SearchBackends, timeout: Duration) -> Self {
        Self { backends, timeout }
    }

    pub async fn count(&self, plan: &ExecutionPlan) -> SearchResult<ResultCount> {
        let _perf = PerfTracer::start(format!("count:{}", plan.kind()));
        let count = match &plan.strategy {
            Strategy::IndexOnly { index } | Strategy::Hybrid { index, .. } => {
                match &self.backends.index {
                    Some(backend) => {
                        let request = index.request(0, 0);
                        let response =
                            bounded(BackendKind::Index, self.timeout, backend.search(&request))
                                .await?;
                        ResultCount::Exact(response.total)
                    }
                    None => ResultCount::Unknown,
                }
            }
            Strategy::GraphOnly { graph } => {
                let ids = bounded(
                    BackendKind::Graph,
                    self.timeout,
                    self.backends.graph.vertex_ids(graph),
                )
                .await?;
                ResultCount::Exact(ids.count() as u64)
            }
            Strategy::InMemory => ResultCount::Unknown,
        };
        debug!("{} plan count: {}", plan.kind(), count);
        Ok(count)
    }
}
