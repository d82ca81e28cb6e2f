// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cooperative request termination
//!
//! A signal is shared by every stage of a request. Processors poll it before
//! each backend fetch and stop with whatever they accumulated so far, which
//! the coordinator reports as a partial response.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a request stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Cancelled,
    DeadlineExceeded,
    /// The raw record guard was reached
    FetchLimit,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Cancelled => write!(f, "request cancelled"),
            TerminationReason::DeadlineExceeded => write!(f, "request deadline exceeded"),
            TerminationReason::FetchLimit => write!(f, "fetched record limit reached"),
        }
    }
}

/// Cancel flag, optional deadline and optional raw-fetch guard
#[derive(Clone, Default)]
pub struct TerminationSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    max_fetched: Option<usize>,
}

impl fmt::Debug for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationSignal")
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .field("deadline", &self.deadline)
            .field("max_fetched", &self.max_fetched)
            .finish()
    }
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Stop once this many raw records have been fetched by a stage
    pub fn with_max_fetched(mut self, max_fetched: usize) -> Self {
        self.max_fetched = Some(max_fetched);
        self
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check whether a stage that already fetched `fetched` raw records has
    /// to stop
    pub fn check(&self, fetched: usize) -> Option<TerminationReason> {
        if self.is_cancelled() {
            return Some(TerminationReason::Cancelled);
        }
        if self.deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            return Some(TerminationReason::DeadlineExceeded);
        }
        match self.max_fetched {
            Some(max) if fetched >= max => Some(TerminationReason::FetchLimit),
            _ => None,
        }
    }
}
