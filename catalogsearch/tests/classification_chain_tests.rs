//! Classification searches and multi-stage processor chains
//!
//! Covers the "any" and "none" classification modes, propagated
//! classifications, the stage orderings chosen for type plus classification
//! requests, and filter-stage idempotence.

#[path = "testutils/mod.rs"]
mod testutils;

use catalogsearch::backend::{GraphBackend, GraphQuery};
use catalogsearch::exec::{
    EntitySearchProcessor, QueryContext, SearchBackends, SearchProcessor,
};
use catalogsearch::plan::{FilterCompiler, StageRole, StrategySelector};
use catalogsearch::{
    FilterCriteria, Operator, ResultCount, SearchConfig, SearchError, SearchRequest, SortOrder,
    StageKind, StrategyKind, TerminationSignal,
};
use std::sync::Arc;
use testutils::search_fixture::{load_catalog, sorted_guids, IndexMode, SearchFixture};

fn guids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn columns_with(fixture: &SearchFixture, classification: &str) -> Vec<String> {
    let request = SearchRequest::for_type("Column").with_classification(classification);
    sorted_guids(&fixture.search(&request).await)
}

#[tokio::test]
async fn test_classification_modes_on_columns() {
    log::debug!("🧪 Testing any, none and specific classification modes");
    let fixture = SearchFixture::new();

    assert_eq!(
        columns_with(&fixture, "_CLASSIFIED").await,
        guids(&["c1", "c2", "c3"])
    );
    assert_eq!(columns_with(&fixture, "*").await, guids(&["c1", "c2", "c3"]));
    assert_eq!(columns_with(&fixture, "_NOT_CLASSIFIED").await, guids(&["c4"]));
    assert_eq!(columns_with(&fixture, "Finance").await, guids(&["c2"]));
}

#[tokio::test]
async fn test_propagated_and_subtype_classifications_match_parent() {
    let fixture = SearchFixture::new();

    // c1 carries the PII_Email subtype, c3 carries PII by propagation
    assert_eq!(columns_with(&fixture, "PII").await, guids(&["c1", "c3"]));
    assert_eq!(columns_with(&fixture, "PII_Email").await, guids(&["c1"]));
}

#[tokio::test]
async fn test_classification_without_type_spans_all_types() {
    let fixture = SearchFixture::new();

    let request = SearchRequest::for_classification("PII").exclude_deleted();
    let response = fixture.search(&request).await;

    assert_eq!(response.strategy, StrategyKind::GraphOnly);
    assert_eq!(
        sorted_guids(&response),
        guids(&["c1", "c3", "t01", "t06", "t11", "t16", "t21", "v2"])
    );
    assert_eq!(response.approximate_count, ResultCount::Exact(8));
}

#[tokio::test]
async fn test_classification_with_free_text_spans_all_types() {
    log::debug!("🧪 Testing ranked search filtered by classification without a type");
    let fixture = SearchFixture::new();

    let request = SearchRequest::for_classification("PII").with_query("orders");
    let explanation = fixture
        .coordinator()
        .explain(&request)
        .expect("Failed to explain request");
    let kinds: Vec<StageKind> = explanation.stages.iter().map(|s| s.stage).collect();
    assert_eq!(kinds, vec![StageKind::Entity, StageKind::Classification]);
    assert_eq!(explanation.strategy, StrategyKind::IndexOnly);

    // v1 ranks first on "orders" but carries no classification
    let response = fixture.search(&request).await;
    assert_eq!(response.strategy, StrategyKind::IndexOnly);
    assert_eq!(response.guids(), vec!["t06", "t21"]);
    assert!(response.is_last_page);

    let err = SearchFixture::without_index()
        .coordinator()
        .search(&request)
        .await
        .expect_err("Free text needs an index backend");
    assert!(matches!(err, SearchError::PlanUnsatisfiable { .. }));
}

#[tokio::test]
async fn test_unknown_classification_rejected() {
    let fixture = SearchFixture::new();

    let err = fixture
        .coordinator()
        .search(&SearchRequest::for_type("Table").with_classification("Secret"))
        .await
        .expect_err("Unknown classification should be rejected");

    assert_eq!(err.clause(), Some("classification = Secret"));
    assert_eq!(fixture.backend_calls(), 0);
}

#[tokio::test]
async fn test_ranked_entities_filtered_by_classification() {
    let fixture = SearchFixture::new();

    let request = SearchRequest::for_type("Table")
        .with_classification("PII")
        .with_query("orders")
        .exclude_deleted();
    let explanation = fixture
        .coordinator()
        .explain(&request)
        .expect("Failed to explain request");
    let kinds: Vec<StageKind> = explanation.stages.iter().map(|s| s.stage).collect();
    assert_eq!(kinds, vec![StageKind::Entity, StageKind::Classification]);

    let response = fixture.search(&request).await;
    assert_eq!(response.strategy, StrategyKind::IndexOnly);
    assert_eq!(sorted_guids(&response), guids(&["t06", "t21"]));
    assert!(response.is_last_page);
}

#[tokio::test]
async fn test_large_classification_set_runs_classification_first() {
    let config = SearchConfig::default().with_max_native_classification_set(1);
    let fixture = SearchFixture::with(IndexMode::AllFields, config);

    let request = SearchRequest::for_type("Table")
        .with_classification("PII")
        .sorted_by("name", SortOrder::Descending)
        .exclude_deleted();
    let explanation = fixture
        .coordinator()
        .explain(&request)
        .expect("Failed to explain request");
    assert_eq!(explanation.stages[0].stage, StageKind::Classification);
    assert_eq!(explanation.stages[1].stage, StageKind::Entity);
    assert!(explanation.stages[1].rescope_query.is_some());

    let response = fixture.search(&request).await;
    assert_eq!(response.guids(), vec!["t21", "t16", "t11", "t06", "t01"]);
}

#[tokio::test]
async fn test_small_classification_set_runs_inline() {
    let fixture = SearchFixture::new();

    let request = SearchRequest::for_type("Table").with_classification("Finance");
    let explanation = fixture
        .coordinator()
        .explain(&request)
        .expect("Failed to explain request");

    assert_eq!(explanation.stages.len(), 1);
    assert_eq!(explanation.strategy, StrategyKind::GraphOnly);
    assert!(explanation.stages[0]
        .graph_query
        .as_deref()
        .unwrap_or_default()
        .contains("__traitNames"));
}

#[tokio::test]
async fn test_entity_filter_stage_is_idempotent() {
    let loaded = load_catalog(&IndexMode::AllFields);
    let request = SearchRequest::for_type("Table")
        .with_filter(FilterCriteria::attribute("tier", Operator::Eq, "gold"))
        .sorted_by("name", SortOrder::Descending);
    let context = Arc::new(
        QueryContext::build(
            &request,
            loaded.registry.as_ref(),
            Arc::new(SearchConfig::default()),
            TerminationSignal::new(),
        )
        .expect("Failed to build query context"),
    );

    let index = loaded.index.clone().expect("Fixture index is enabled");
    let backends = SearchBackends::new(loaded.graph.clone()).with_index(index);
    let fields = backends.index_fields();
    let compiled = FilterCompiler::new(
        loaded.registry.as_ref(),
        &context.entity_types,
        fields.as_deref(),
    )
    .compile(context.criteria.as_ref())
    .expect("Failed to compile filter");
    let plan = StrategySelector::new(&context, loaded.registry.as_ref(), fields.as_deref())
        .select(&compiled, StageRole::Filter, false)
        .expect("Failed to plan filter stage");
    let processor = EntitySearchProcessor::new(context, backends, plan, StageRole::Filter);

    let mut records = loaded
        .graph
        .vertices(&GraphQuery::new(), 0, 100)
        .await
        .expect("Failed to read graph");
    processor
        .filter(&mut records)
        .await
        .expect("First filter pass failed");
    let once: Vec<String> = records.iter().map(|r| r.guid.clone()).collect();
    assert_eq!(once, guids(&["t24", "t20", "t16", "t12", "t08", "t04"]));

    processor
        .filter(&mut records)
        .await
        .expect("Second filter pass failed");
    let twice: Vec<String> = records.iter().map(|r| r.guid.clone()).collect();
    assert_eq!(once, twice);
}
