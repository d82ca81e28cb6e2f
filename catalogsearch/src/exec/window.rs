// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Windowed fetching
//!
//! Residual filtering can drop records after the backend paged them, so one
//! backend page rarely fills a result page. The window keeps fetching
//! `limit`-sized batches until the page is full, the backend runs dry or the
//! request is told to stop:
//!
//! ```text
//! Fetching -> Filtering -> Emitting -> Fetching | Done
//! ```
//!
//! When the backend query starts at offset 0 (plans whose residual can drop
//! records, or stages with a downstream filter) the request offset is
//! applied here on survivors; otherwise the backend already skipped it.

use super::processor::ProcessorOutput;
use super::termination::{TerminationReason, TerminationSignal};
use crate::error::SearchResult;
use crate::model::EntityRecord;
use async_trait::async_trait;
use log::{trace, warn};

/// Records of one backend page
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub records: Vec<EntityRecord>,
    /// Records the primary backend returned before any filtering
    pub raw_len: usize,
}

/// Where a window gets its batches from
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn fetch(&self, offset: usize, limit: usize) -> SearchResult<Batch>;

    /// Residual predicates followed by downstream stages
    async fn filter_batch(&self, records: &mut Vec<EntityRecord>) -> SearchResult<()>;
}

#[derive(Debug)]
pub enum WindowState {
    Fetching,
    Filtering(Vec<EntityRecord>),
    Emitting(Vec<EntityRecord>),
    Done,
}

/// Accumulator for one `execute()` call
#[derive(Debug)]
pub struct ResultWindow {
    state: WindowState,
    limit: usize,
    /// Survivors to skip before emitting
    skip: usize,
    backend_offset: usize,
    survivors_seen: usize,
    accumulated: Vec<EntityRecord>,
    exhausted: bool,
    fetched_raw: usize,
    terminated: Option<TerminationReason>,
}

impl ResultWindow {
    pub fn new(limit: usize, offset: usize, backend_applies_offset: bool) -> Self {
        let (backend_offset, skip) = if backend_applies_offset {
            (offset, 0)
        } else {
            (0, offset)
        };
        Self {
            state: WindowState::Fetching,
            limit,
            skip,
            backend_offset,
            survivors_seen: 0,
            accumulated: Vec::with_capacity(limit.min(1024)),
            exhausted: false,
            fetched_raw: 0,
            terminated: None,
        }
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn fetched_raw(&self) -> usize {
        self.fetched_raw
    }

    /// Drive the window to completion
    pub async fn run<S>(mut self, source: &S, signal: &TerminationSignal) -> SearchResult<ProcessorOutput>
    where
        S: BatchSource + ?Sized,
    {
        if self.limit == 0 {
            return Ok(ProcessorOutput::default());
        }
        loop {
            let state = std::mem::replace(&mut self.state, WindowState::Done);
            self.state = match state {
                WindowState::Fetching => self.fetch(source, signal).await?,
                WindowState::Filtering(mut records) => {
                    source.filter_batch(&mut records).await?;
                    WindowState::Emitting(records)
                }
                WindowState::Emitting(records) => self.emit(records),
                WindowState::Done => break,
            };
        }
        Ok(ProcessorOutput {
            records: self.accumulated,
            is_last_page: self.exhausted,
            terminated: self.terminated,
        })
    }

    async fn fetch<S>(&mut self, source: &S, signal: &TerminationSignal) -> SearchResult<WindowState>
    where
        S: BatchSource + ?Sized,
    {
        if let Some(reason) = signal.check(self.fetched_raw) {
            warn!(
                "search terminated after {} fetched records: {}",
                self.fetched_raw, reason
            );
            self.terminated = Some(reason);
            return Ok(WindowState::Done);
        }
        let batch = source.fetch(self.backend_offset, self.limit).await?;
        trace!(
            "window fetched {} raw records at offset {}",
            batch.raw_len,
            self.backend_offset
        );
        self.fetched_raw += batch.raw_len;
        self.backend_offset += self.limit;
        self.exhausted = batch.raw_len < self.limit;
        Ok(WindowState::Filtering(batch.records))
    }

    fn emit(&mut self, records: Vec<EntityRecord>) -> WindowState {
        let mut records = records.into_iter();
        for record in records.by_ref() {
            self.survivors_seen += 1;
            if self.survivors_seen <= self.skip {
                continue;
            }
            self.accumulated.push(record);
            if self.accumulated.len() >= self.limit {
                break;
            }
        }
        // Survivors left in a short batch belong to the next page
        if records.len() > 0 {
            self.exhausted = false;
        }
        if self.accumulated.len() >= self.limit || self.exhausted {
            WindowState::Done
        } else {
            WindowState::Fetching
        }
    }
}
