// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend contracts: the graph store and the inverted index
//!
//! Both backends are consumed through async traits. Every call made by the
//! processors goes through [`bounded`] so that a stalled backend surfaces as
//! a retryable error instead of hanging the request.

pub mod graph;
pub mod index;
pub mod memory;

pub use graph::{GraphBackend, GraphClause, GraphQuery};
pub use index::{
    normalize_query_string, IndexBackend, IndexHit, IndexQuery, IndexSearchRequest,
    IndexSearchResponse,
};

use crate::model::SortOrder;
use log::warn;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Which backend an error or call refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Graph,
    Index,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Graph => write!(f, "graph"),
            BackendKind::Index => write!(f, "index"),
        }
    }
}

/// Errors reported by backend implementations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{backend} backend unavailable: {message}")]
    Unavailable {
        backend: BackendKind,
        message: String,
    },

    #[error("{backend} backend call timed out after {timeout_ms}ms")]
    Timeout {
        backend: BackendKind,
        timeout_ms: u64,
    },

    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: BackendKind,
        operation: String,
    },

    #[error("{backend} backend internal error: {message}")]
    Internal {
        backend: BackendKind,
        message: String,
    },
}

impl BackendError {
    pub fn unavailable(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            message: message.into(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self {
            BackendError::Unavailable { backend, .. }
            | BackendError::Timeout { backend, .. }
            | BackendError::Unsupported { backend, .. }
            | BackendError::Internal { backend, .. } => *backend,
        }
    }
}

/// Sort key on a storage property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub property: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(property: impl Into<String>, order: SortOrder) -> Self {
        Self {
            property: property.into(),
            order,
        }
    }
}

/// Run a backend call with a timeout
pub async fn bounded<T, F>(backend: BackendKind, timeout: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "{} backend call exceeded {}ms, abandoning",
                backend,
                timeout.as_millis()
            );
            Err(BackendError::Timeout {
                backend,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
