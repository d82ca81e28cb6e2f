// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Search processor configuration

use crate::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Search processor configuration
///
/// Missing fields in a configuration file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Name of the index backend's vertex index
    pub index_name: String,

    /// Page size used when a request does not carry a limit
    pub default_limit: usize,

    /// Upper bound for a requested page size
    pub max_limit: usize,

    /// Longest type-membership clause sent to the index backend
    pub max_type_query_length: usize,

    /// Largest classification set filtered natively alongside entity filters
    pub max_native_classification_set: usize,

    /// Timeout applied to each backend call
    pub backend_timeout: Duration,

    /// Deadline for a whole request; `None` disables it
    pub request_timeout: Option<Duration>,

    /// Stop fetching once this many records came back from the backends
    pub max_fetched_records: Option<usize>,

    /// Number of compiled filter shapes kept in the filter cache
    pub filter_cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_name: "vertex_index".to_string(),
            default_limit: 100,
            max_limit: 10_000,
            max_type_query_length: 512,
            max_native_classification_set: 64,
            backend_timeout: Duration::from_secs(30),
            request_timeout: None,
            max_fetched_records: None,
            filter_cache_capacity: 1024,
        }
    }
}

impl SearchConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SearchResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: SearchConfig = serde_json::from_str(&raw).map_err(|e| {
            SearchError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> SearchResult<()> {
        if self.index_name.trim().is_empty() {
            return Err(SearchError::Config("index_name must not be empty".into()));
        }
        if self.max_limit == 0 {
            return Err(SearchError::Config("max_limit must be positive".into()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(SearchError::Config(format!(
                "default_limit must be between 1 and max_limit ({})",
                self.max_limit
            )));
        }
        if self.backend_timeout.is_zero() {
            return Err(SearchError::Config(
                "backend_timeout must be positive".into(),
            ));
        }
        if self.max_fetched_records == Some(0) {
            return Err(SearchError::Config(
                "max_fetched_records must be positive when set".into(),
            ));
        }
        Ok(())
    }

    /// Clamp a requested page size into `[0, max_limit]`
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_max_limit(mut self, limit: usize) -> Self {
        self.max_limit = limit;
        self
    }

    pub fn with_max_type_query_length(mut self, length: usize) -> Self {
        self.max_type_query_length = length;
        self
    }

    pub fn with_max_native_classification_set(mut self, size: usize) -> Self {
        self.max_native_classification_set = size;
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_max_fetched_records(mut self, max: usize) -> Self {
        self.max_fetched_records = Some(max);
        self
    }

    pub fn with_filter_cache_capacity(mut self, capacity: usize) -> Self {
        self.filter_cache_capacity = capacity;
        self
    }
}
