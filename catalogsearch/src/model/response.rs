// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Search responses

use super::entity::EntityRecord;
use serde::{Serialize, Serializer};
use std::fmt;

/// Total number of matches for a request
///
/// Serialized as a number, with `-1` standing for an unknown count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCount {
    Exact(u64),
    Unknown,
}

impl ResultCount {
    pub fn as_i64(&self) -> i64 {
        match self {
            ResultCount::Exact(n) => *n as i64,
            ResultCount::Unknown => -1,
        }
    }

    pub fn exact(&self) -> Option<u64> {
        match self {
            ResultCount::Exact(n) => Some(*n),
            ResultCount::Unknown => None,
        }
    }
}

impl Serialize for ResultCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl fmt::Display for ResultCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCount::Exact(n) => write!(f, "{}", n),
            ResultCount::Unknown => write!(f, "unknown"),
        }
    }
}

/// Execution strategy chosen for the primary stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    IndexOnly,
    GraphOnly,
    Hybrid,
    InMemory,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::IndexOnly => "index-only",
            StrategyKind::GraphOnly => "graph-only",
            StrategyKind::Hybrid => "hybrid",
            StrategyKind::InMemory => "in-memory",
        };
        f.write_str(name)
    }
}

/// Result of a search request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub entities: Vec<EntityRecord>,
    pub approximate_count: ResultCount,
    /// No further pages exist beyond this one
    pub is_last_page: bool,
    /// Execution stopped early on cancellation, deadline or size guard
    pub partial: bool,
    pub strategy: StrategyKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub execution_time_ms: u64,
}

impl SearchResponse {
    pub fn guids(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.guid.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
