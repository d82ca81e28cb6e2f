//! Test utilities for catalogsearch integration tests
//!
//! - SearchFixture: a small catalog loaded into the in-memory backends
//! - backends: graph wrappers that fail, stall or cancel on demand

#![allow(dead_code)]

pub mod backends;
pub mod search_fixture;
