// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Processor chains

use super::processor::{ProcessorOutput, SearchProcessor};
use crate::error::SearchResult;
use crate::model::ResultCount;

/// Stages linked head to tail; the head produces, the rest filter
pub struct ProcessorChain {
    head: Box<dyn SearchProcessor>,
}

impl ProcessorChain {
    pub fn link(head: Box<dyn SearchProcessor>, rest: Vec<Box<dyn SearchProcessor>>) -> Self {
        let mut stages = rest.into_iter().rev();
        let head = match stages.next() {
            Some(mut tail) => {
                for mut stage in stages {
                    stage.set_next(tail);
                    tail = stage;
                }
                let mut head = head;
                head.set_next(tail);
                head
            }
            None => head,
        };
        Self { head }
    }

    pub fn head(&self) -> &dyn SearchProcessor {
        self.head.as_ref()
    }

    /// Stages in execution order
    pub fn stages(&self) -> impl Iterator<Item = &dyn SearchProcessor> {
        std::iter::successors(Some(self.head.as_ref()), |stage| stage.next())
    }

    pub async fn execute(&self) -> SearchResult<ProcessorOutput> {
        self.head.execute().await
    }

    /// Count of the producing stage
    pub async fn result_count(&self) -> SearchResult<ResultCount> {
        self.head.result_count().await
    }
}
