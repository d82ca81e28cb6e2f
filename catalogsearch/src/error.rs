// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for search planning and execution

use crate::backend::BackendError;
use thiserror::Error;

/// Errors surfaced to search callers
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid filter '{clause}': {reason}")]
    InvalidFilter { clause: String, reason: String },

    #[error("Unsatisfiable search '{clause}': {reason}")]
    PlanUnsatisfiable { clause: String, reason: String },

    /// Backend failure or timeout. Details stay in the source error.
    #[error("Search temporarily unavailable")]
    BackendUnavailable(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SearchError {
    pub fn invalid_filter(clause: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            clause: clause.into(),
            reason: reason.into(),
        }
    }

    pub fn unsatisfiable(clause: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlanUnsatisfiable {
            clause: clause.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::BackendUnavailable(_))
    }

    /// The clause a validation or planning error refers to
    pub fn clause(&self) -> Option<&str> {
        match self {
            SearchError::InvalidFilter { clause, .. }
            | SearchError::PlanUnsatisfiable { clause, .. } => Some(clause),
            _ => None,
        }
    }
}

pub type SearchResult<T> = Result<T, SearchError>;
