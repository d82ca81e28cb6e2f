// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! catalogsearch - hybrid search over a metadata catalog
//!
//! Searches entities stored in a property graph, using an inverted index for
//! free text, relevance ranking and pre-filtering where it helps.
//!
//! # Features
//!
//! - **Filter compilation**: nested AND/OR attribute filters resolved against
//!   the type registry and split between index, graph and memory
//! - **Strategy selection**: index-only, graph-only or hybrid per request
//! - **Classification search**: direct and propagated classifications,
//!   including the "any" and "none" modes
//! - **Windowed paging**: pages stay full and gap-free when in-memory
//!   predicates drop records
//! - **Cooperative termination**: cancellation, deadlines and fetch guards
//!   return partial results instead of errors
//!
//! # Usage
//!
//! ```bash
//! catalogsearch search --dataset catalog.json --request request.json
//! catalogsearch explain --dataset catalog.json --request request.json
//! ```

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod exec;
pub mod model;
pub mod plan;
pub mod predicate;
pub mod registry;

pub use config::SearchConfig;
pub use coordinator::{SearchCoordinator, SearchExplanation, StageExplanation, StageKind};
pub use error::{SearchError, SearchResult};
pub use exec::{TerminationReason, TerminationSignal};
pub use model::{
    AttributeValue, EntityRecord, EntityState, FilterCriteria, Operator, ResultCount,
    SearchRequest, SearchResponse, SortOrder, StrategyKind,
};

/// catalogsearch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// catalogsearch crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
