//! Graph backend wrappers for failure injection

use async_trait::async_trait;
use catalogsearch::backend::{BackendError, BackendKind, GraphBackend, GraphQuery};
use catalogsearch::{EntityRecord, TerminationSignal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Graph backend that is always down
pub struct FailingGraph;

#[async_trait]
impl GraphBackend for FailingGraph {
    async fn vertices(
        &self,
        _query: &GraphQuery,
        _offset: usize,
        _limit: usize,
    ) -> Result<Vec<EntityRecord>, BackendError> {
        Err(BackendError::unavailable(
            BackendKind::Graph,
            "connection refused",
        ))
    }

    async fn vertex_ids(
        &self,
        _query: &GraphQuery,
    ) -> Result<Box<dyn Iterator<Item = String> + Send>, BackendError> {
        Err(BackendError::unavailable(
            BackendKind::Graph,
            "connection refused",
        ))
    }
}

/// Graph backend that answers only after `delay`
pub struct SlowGraph {
    inner: Arc<dyn GraphBackend>,
    delay: Duration,
}

impl SlowGraph {
    pub fn new(inner: Arc<dyn GraphBackend>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl GraphBackend for SlowGraph {
    async fn vertices(
        &self,
        query: &GraphQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.vertices(query, offset, limit).await
    }

    async fn vertex_ids(
        &self,
        query: &GraphQuery,
    ) -> Result<Box<dyn Iterator<Item = String> + Send>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.vertex_ids(query).await
    }
}

/// Graph backend that cancels `signal` once `after` vertex fetches returned
pub struct CancellingGraph {
    inner: Arc<dyn GraphBackend>,
    signal: TerminationSignal,
    after: usize,
    fetches: AtomicUsize,
}

impl CancellingGraph {
    pub fn new(inner: Arc<dyn GraphBackend>, signal: TerminationSignal, after: usize) -> Self {
        Self {
            inner,
            signal,
            after,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl GraphBackend for CancellingGraph {
    async fn vertices(
        &self,
        query: &GraphQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, BackendError> {
        let records = self.inner.vertices(query, offset, limit).await?;
        if self.fetches.fetch_add(1, Ordering::Relaxed) + 1 >= self.after {
            self.signal.cancel();
        }
        Ok(records)
    }

    async fn vertex_ids(
        &self,
        query: &GraphQuery,
    ) -> Result<Box<dyn Iterator<Item = String> + Send>, BackendError> {
        self.inner.vertex_ids(query).await
    }
}
