//! Early termination and backend failure handling
//!
//! Cancellation, deadlines and fetch guards produce partial results; backend
//! outages and timeouts surface as retryable errors.

#[path = "testutils/mod.rs"]
mod testutils;

use catalogsearch::backend::GraphBackend;
use catalogsearch::{
    ResultCount, SearchConfig, SearchError, SearchRequest, TerminationReason, TerminationSignal,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use testutils::backends::{CancellingGraph, FailingGraph, SlowGraph};
use testutils::search_fixture::{IndexMode, SearchFixture};

/// Classification filtered in memory: each batch of 10 tables keeps only
/// its PII members
fn memory_filtered_config() -> SearchConfig {
    SearchConfig::default().with_max_native_classification_set(0)
}

fn pii_tables() -> SearchRequest {
    SearchRequest::for_type("Table")
        .with_classification("PII")
        .with_limit(10)
}

#[tokio::test]
async fn test_cancellation_after_first_batch_returns_its_survivors() {
    log::debug!("🧪 Testing cancellation after batch 1 of 3");
    let fixture = SearchFixture::with(IndexMode::AllFields, memory_filtered_config());
    let signal = TerminationSignal::new();
    let graph = Arc::new(CancellingGraph::new(
        fixture.graph.clone(),
        signal.clone(),
        1,
    ));
    let coordinator = fixture.coordinator_over(graph.clone(), memory_filtered_config());

    let response = coordinator
        .search_with_signal(&pii_tables(), signal)
        .await
        .expect("Cancelled search should still succeed");

    assert!(response.partial);
    assert_eq!(response.guids(), vec!["t01", "t06"]);
    assert_eq!(response.approximate_count, ResultCount::Unknown);
    assert!(!response.is_last_page);
    assert!(response.warnings.iter().any(|w| w.contains("cancelled")));
    assert_eq!(graph.fetches(), 1);
}

#[tokio::test]
async fn test_uncancelled_search_reads_all_batches() {
    let fixture = SearchFixture::with(IndexMode::AllFields, memory_filtered_config());

    let response = fixture.search(&pii_tables()).await;

    assert!(!response.partial);
    assert_eq!(response.guids(), vec!["t01", "t06", "t11", "t16", "t21", "t26"]);
    assert!(response.is_last_page);
}

#[tokio::test]
async fn test_expired_deadline_returns_empty_partial_result() {
    let fixture = SearchFixture::new();
    let signal = TerminationSignal::new().with_deadline(Instant::now());

    let response = fixture
        .coordinator()
        .search_with_signal(&SearchRequest::for_type("Table"), signal)
        .await
        .expect("Expired deadline should not be an error");

    assert!(response.partial);
    assert!(response.is_empty());
    assert_eq!(response.approximate_count, ResultCount::Unknown);
    assert_eq!(fixture.backend_calls(), 0);
}

#[tokio::test]
async fn test_fetch_guard_stops_after_first_batch() {
    let config = memory_filtered_config().with_max_fetched_records(10);
    let fixture = SearchFixture::with(IndexMode::AllFields, config);

    let response = fixture.search(&pii_tables()).await;

    assert!(response.partial);
    assert_eq!(response.guids(), vec!["t01", "t06"]);
    assert!(response
        .warnings
        .iter()
        .any(|w| w.contains(&TerminationReason::FetchLimit.to_string())));
}

#[tokio::test]
async fn test_graph_outage_is_retryable() {
    let fixture = SearchFixture::without_index();
    let coordinator = fixture.coordinator_over(Arc::new(FailingGraph), SearchConfig::default());

    let err = coordinator
        .search(&SearchRequest::for_type("Table"))
        .await
        .expect_err("Graph outage should fail the search");

    assert!(matches!(err, SearchError::BackendUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_graph_outage_after_index_hits_is_retryable() {
    // Index hits are resolved against the graph, so the outage still surfaces
    let fixture = SearchFixture::new();
    let coordinator = fixture.coordinator_over(Arc::new(FailingGraph), SearchConfig::default());

    let err = coordinator
        .search(&SearchRequest::for_type("Table").with_query("orders"))
        .await
        .expect_err("Graph outage should fail the search");

    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slow_graph_times_out() {
    let fixture = SearchFixture::without_index();
    let config = SearchConfig::default().with_backend_timeout(Duration::from_millis(20));
    let slow: Arc<dyn GraphBackend> = Arc::new(SlowGraph::new(
        fixture.graph.clone(),
        Duration::from_millis(500),
    ));
    let coordinator = fixture.coordinator_over(slow, config);

    let started = Instant::now();
    let err = coordinator
        .search(&SearchRequest::for_type("Table"))
        .await
        .expect_err("Stalled graph should time out");

    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_millis(500));
}
