// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Timing of search operations, logged on the `catalogsearch::perf` target

use log::{debug, log_enabled, Level};
use std::time::Instant;

pub const PERF_TARGET: &str = "catalogsearch::perf";

/// Logs `PERF|<operation>|<ms>` when dropped
#[derive(Debug)]
pub struct PerfTracer {
    operation: String,
    started: Option<Instant>,
}

impl PerfTracer {
    /// Start timing; a no-op unless the perf target is enabled at debug level
    pub fn start(operation: impl Into<String>) -> Self {
        let started = log_enabled!(target: PERF_TARGET, Level::Debug).then(Instant::now);
        Self {
            operation: operation.into(),
            started,
        }
    }
}

impl Drop for PerfTracer {
    fn drop(&mut self) {
        if let Some(started) = self.started {
            debug!(
                target: PERF_TARGET,
                "PERF|{}|{}",
                self.operation,
                started.elapsed().as_millis()
            );
        }
    }
}
