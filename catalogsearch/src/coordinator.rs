// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Search Coordinator - entry point for catalog searches
//!
//! The coordinator validates a request, plans each stage, links the stages
//! into a processor chain, runs it and assembles the response.

use crate::backend::memory::LoadedDataset;
use crate::backend::{GraphBackend, IndexBackend};
use crate::config::SearchConfig;
use crate::error::SearchResult;
use crate::exec::{
    ClassificationSearchProcessor, EntitySearchProcessor, PerfTracer, ProcessorChain,
    QueryContext, SearchBackends, SearchProcessor, TerminationSignal,
};
use crate::model::{ResultCount, SearchRequest, SearchResponse, StrategyKind};
use crate::plan::{
    CompiledCriteria, CompiledFilterCache, CompiledFilterKey, ExecutionPlan, FilterCacheStats,
    FilterCompiler, StageRole, StrategySelector,
};
use crate::registry::TypeRegistry;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Kind of search stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Entity,
    Classification,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Entity => write!(f, "entity"),
            StageKind::Classification => write!(f, "classification"),
        }
    }
}

struct PlannedStage {
    kind: StageKind,
    role: StageRole,
    plan: ExecutionPlan,
}

/// How one stage of a request would run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageExplanation {
    pub stage: StageKind,
    pub primary: bool,
    pub strategy: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_query: Option<String>,
    pub residual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescope_query: Option<String>,
}

/// Plan of a request without running it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchExplanation {
    pub strategy: StrategyKind,
    pub stages: Vec<StageExplanation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Search Coordinator - plans and runs catalog searches
///
/// Backends and the type registry are injected once and shared by every
/// request. A coordinator is `Send + Sync`; concurrent searches share only
/// the compiled filter cache.
///
/// # Example
/// ```no_run
/// use catalogsearch::backend::memory::Dataset;
/// use catalogsearch::{SearchConfig, SearchCoordinator, SearchRequest};
///
/// # async fn run() -> catalogsearch::SearchResult<()> {
/// let loaded = Dataset::from_json_file("catalog.json")?.load()?;
/// let coordinator = SearchCoordinator::from_dataset(loaded, SearchConfig::default());
///
/// let response = coordinator
///     .search(&SearchRequest::for_type("Table").with_query("orders"))
///     .await?;
/// println!("{} of {}", response.len(), response.approximate_count);
/// # Ok(())
/// # }
/// ```
pub struct SearchCoordinator {
    backends: SearchBackends,
    registry: Arc<dyn TypeRegistry>,
    config: Arc<SearchConfig>,
    filter_cache: CompiledFilterCache,
}

impl SearchCoordinator {
    /// Create a coordinator over a graph backend, without an index
    pub fn new(
        graph: Arc<dyn GraphBackend>,
        registry: Arc<dyn TypeRegistry>,
        config: SearchConfig,
    ) -> Self {
        Self {
            backends: SearchBackends::new(graph),
            registry,
            filter_cache: CompiledFilterCache::new(config.filter_cache_capacity),
            config: Arc::new(config),
        }
    }

    /// Add an index backend
    pub fn with_index(mut self, index: Arc<dyn IndexBackend>) -> Self {
        self.backends = self.backends.with_index(index);
        self
    }

    /// Create a coordinator over the in-memory backends of a dataset
    pub fn from_dataset(loaded: LoadedDataset, config: SearchConfig) -> Self {
        let coordinator = Self::new(loaded.graph, loaded.registry, config);
        match loaded.index {
            Some(index) => coordinator.with_index(index),
            None => coordinator,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn filter_cache_stats(&self) -> FilterCacheStats {
        self.filter_cache.stats()
    }

    /// Signal carrying the configured request deadline and fetch guard
    pub fn default_signal(&self) -> TerminationSignal {
        let mut signal = TerminationSignal::new();
        if let Some(timeout) = self.config.request_timeout {
            signal = signal.with_timeout(timeout);
        }
        if let Some(max) = self.config.max_fetched_records {
            signal = signal.with_max_fetched(max);
        }
        signal
    }

    /// Run a search with the configured deadline and fetch guard
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        self.search_with_signal(request, self.default_signal()).await
    }

    /// Run a search that stops early once `signal` fires
    ///
    /// Early termination is not an error: the records gathered so far are
    /// returned with `partial` set and an unknown count.
    pub async fn search_with_signal(
        &self,
        request: &SearchRequest,
        signal: TerminationSignal,
    ) -> SearchResult<SearchResponse> {
        let started = Instant::now();
        let _perf = PerfTracer::start("search");

        let context = Arc::new(QueryContext::build(
            request,
            self.registry.as_ref(),
            Arc::clone(&self.config),
            signal,
        )?);
        let stages = self.plan_stages(&context)?;
        let strategy = stages[0].plan.kind();
        let mut warnings = collect_warnings(&stages);
        info!(
            "search types={:?} classification={:?} strategy={} stages={}",
            context.entity_types,
            context.classification,
            strategy,
            stages.len()
        );

        let chain = self.link(&context, stages);
        let output = chain.execute().await?;

        let approximate_count = if context.include_count && output.terminated.is_none() {
            chain.result_count().await?
        } else {
            ResultCount::Unknown
        };
        if let Some(reason) = output.terminated {
            warnings.push(format!("partial results: {}", reason));
        }

        let response = SearchResponse {
            entities: output.records,
            approximate_count,
            is_last_page: output.is_last_page,
            partial: output.terminated.is_some(),
            strategy,
            warnings,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            "search returned {} records (count {}, last page {}) in {}ms",
            response.len(),
            response.approximate_count,
            response.is_last_page,
            response.execution_time_ms
        );
        Ok(response)
    }

    /// Plan a request without touching the backends
    pub fn explain(&self, request: &SearchRequest) -> SearchResult<SearchExplanation> {
        let context = QueryContext::build(
            request,
            self.registry.as_ref(),
            Arc::clone(&self.config),
            TerminationSignal::new(),
        )?;
        let stages = self.plan_stages(&context)?;
        let warnings = collect_warnings(&stages);
        let explained = stages
            .iter()
            .map(|stage| StageExplanation {
                stage: stage.kind,
                primary: stage.role == StageRole::Primary,
                strategy: stage.plan.kind(),
                index_query: stage
                    .plan
                    .strategy
                    .index()
                    .map(|t| t.request(context.offset, context.limit).wire_query()),
                graph_query: stage.plan.strategy.graph().map(|g| g.to_string()),
                residual: stage.plan.residual.to_string(),
                rescope_query: stage
                    .plan
                    .rescope
                    .as_ref()
                    .map(|t| t.request(0, context.limit).wire_query()),
            })
            .collect();
        Ok(SearchExplanation {
            strategy: stages[0].plan.kind(),
            stages: explained,
            warnings,
        })
    }

    fn compile(
        &self,
        context: &QueryContext,
        index_fields: Option<&BTreeSet<String>>,
    ) -> SearchResult<Arc<CompiledCriteria>> {
        let key = CompiledFilterKey::new(
            &context.entity_types,
            context.criteria.as_ref(),
            index_fields,
        );
        self.filter_cache.get_or_compile(key, || {
            FilterCompiler::new(self.registry.as_ref(), &context.entity_types, index_fields)
                .compile(context.criteria.as_ref())
        })
    }

    /// Decide the stages of a request, primary first
    fn plan_stages(&self, context: &QueryContext) -> SearchResult<Vec<PlannedStage>> {
        let index_fields = self.backends.index_fields();
        let fields = index_fields.as_deref();
        let selector = StrategySelector::new(context, self.registry.as_ref(), fields);
        let compiled = self.compile(context, fields)?;

        let entity = |role: StageRole, inline: bool| -> SearchResult<PlannedStage> {
            Ok(PlannedStage {
                kind: StageKind::Entity,
                role,
                plan: selector.select(&compiled, role, inline)?,
            })
        };
        let classification = |role: StageRole| -> SearchResult<PlannedStage> {
            Ok(PlannedStage {
                kind: StageKind::Classification,
                role,
                plan: selector.select_classification(role)?,
            })
        };

        let stages = match &context.classification {
            None => vec![entity(StageRole::Primary, false)?],
            // Ranking needs the entity stage to drive the index, with or
            // without a type clause
            Some(_) if context.free_text.is_some() => vec![
                entity(StageRole::Primary, false)?,
                classification(StageRole::Filter)?,
            ],
            Some(_) if !context.has_entity_types() => {
                vec![classification(StageRole::Primary)?]
            }
            Some(filter) if filter.native_size() > self.config.max_native_classification_set => {
                vec![
                    classification(StageRole::Primary)?,
                    entity(StageRole::Filter, false)?,
                ]
            }
            Some(_) => vec![entity(StageRole::Primary, true)?],
        };
        Ok(stages)
    }

    fn link(&self, context: &Arc<QueryContext>, stages: Vec<PlannedStage>) -> ProcessorChain {
        let mut processors: Vec<Box<dyn SearchProcessor>> = stages
            .into_iter()
            .map(|stage| -> Box<dyn SearchProcessor> {
                match stage.kind {
                    StageKind::Entity => Box::new(EntitySearchProcessor::new(
                        Arc::clone(context),
                        self.backends.clone(),
                        stage.plan,
                        stage.role,
                    )),
                    StageKind::Classification => Box::new(ClassificationSearchProcessor::new(
                        Arc::clone(context),
                        self.backends.clone(),
                        stage.plan,
                        stage.role,
                    )),
                }
            })
            .collect();
        let head = processors.remove(0);
        ProcessorChain::link(head, processors)
    }
}

fn collect_warnings(stages: &[PlannedStage]) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();
    for warning in stages.iter().flat_map(|s| s.plan.warnings.iter()) {
        if !warnings.contains(warning) {
            warnings.push(warning.clone());
        }
    }
    warnings
}
