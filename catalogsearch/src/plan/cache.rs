// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compiled filter cache
//!
//! Compiling a filter resolves every attribute against the registry. The
//! result only depends on the requested types, the criteria tree and the
//! index's filterable fields, so identical requests share one compilation.
//! Readers look entries up in an `Arc` snapshot of the map; writers copy the
//! map, insert, and swap the snapshot. Entries are evicted oldest first once
//! the cache is full.

use super::compiler::CompiledCriteria;
use crate::error::SearchResult;
use crate::model::FilterCriteria;
use log::{debug, trace};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Identity of a compilation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledFilterKey(String);

#[derive(Serialize)]
struct KeyParts<'a> {
    types: &'a [String],
    criteria: Option<&'a FilterCriteria>,
    fields: Option<&'a BTreeSet<String>>,
}

impl CompiledFilterKey {
    pub fn new(
        entity_types: &[String],
        criteria: Option<&FilterCriteria>,
        index_fields: Option<&BTreeSet<String>>,
    ) -> Self {
        let mut types = entity_types.to_vec();
        types.sort();
        types.dedup();
        let parts = KeyParts {
            types: &types,
            criteria,
            fields: index_fields,
        };
        // Serializing plain data into a string does not fail; the debug
        // rendering keeps the key unique if it ever did.
        let raw = serde_json::to_string(&parts).unwrap_or_else(|_| format!("{:?}", criteria));
        CompiledFilterKey(raw)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_entries: usize,
}

impl FilterCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default, Clone)]
struct CacheState {
    entries: HashMap<CompiledFilterKey, Arc<CompiledCriteria>>,
    insertion_order: VecDeque<CompiledFilterKey>,
}

/// Bounded cache of compiled filters; a capacity of 0 disables caching
pub struct CompiledFilterCache {
    state: RwLock<Arc<CacheState>>,
    stats: RwLock<FilterCacheStats>,
    capacity: usize,
}

impl CompiledFilterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(Arc::new(CacheState::default())),
            stats: RwLock::new(FilterCacheStats::default()),
            capacity,
        }
    }

    pub fn get(&self, key: &CompiledFilterKey) -> Option<Arc<CompiledCriteria>> {
        let snapshot = Arc::clone(&self.state.read());
        let found = snapshot.entries.get(key).cloned();
        let mut stats = self.stats.write();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    pub fn insert(&self, key: CompiledFilterKey, compiled: Arc<CompiledCriteria>) {
        if self.capacity == 0 {
            return;
        }
        let mut guard = self.state.write();
        let mut state = CacheState::clone(&guard);
        let mut evicted = 0;
        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.capacity {
                match state.insertion_order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                        evicted += 1;
                    }
                    None => break,
                }
            }
            state.insertion_order.push_back(key.clone());
        }
        state.entries.insert(key, compiled);
        *guard = Arc::new(state);
        drop(guard);

        if evicted > 0 {
            trace!("filter cache evicted {} entries", evicted);
            self.stats.write().evictions += evicted;
        }
    }

    /// Return the cached compilation or compile and remember it; failed
    /// compilations are not cached
    pub fn get_or_compile<F>(
        &self,
        key: CompiledFilterKey,
        compile: F,
    ) -> SearchResult<Arc<CompiledCriteria>>
    where
        F: FnOnce() -> SearchResult<CompiledCriteria>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let compiled = Arc::new(compile()?);
        self.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn clear(&self) {
        *self.state.write() = Arc::new(CacheState::default());
        debug!("filter cache cleared");
    }

    pub fn stats(&self) -> FilterCacheStats {
        let mut stats = self.stats.read().clone();
        stats.current_entries = self.len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::model::Operator;

    fn key(types: &[&str], value: &str) -> CompiledFilterKey {
        let types: Vec<String> = types.iter().map(|s| s.to_string()).collect();
        let criteria = FilterCriteria::attribute("name", Operator::Eq, value);
        CompiledFilterKey::new(&types, Some(&criteria), None)
    }

    #[test]
    fn test_key_ignores_type_order() {
        assert_eq!(key(&["Table", "View"], "a"), key(&["View", "Table", "View"], "a"));
        assert_ne!(key(&["Table"], "a"), key(&["Table"], "b"));
    }

    #[test]
    fn test_hit_after_compile() {
        let cache = CompiledFilterCache::new(4);
        let mut compilations = 0;
        for _ in 0..3 {
            cache
                .get_or_compile(key(&["Table"], "a"), || {
                    compilations += 1;
                    Ok(CompiledCriteria::default())
                })
                .unwrap();
        }
        assert_eq!(compilations, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let cache = CompiledFilterCache::new(2);
        for value in ["a", "b", "c"] {
            cache.insert(key(&["Table"], value), Arc::new(CompiledCriteria::default()));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(&["Table"], "a")).is_none());
        assert!(cache.get(&key(&["Table"], "c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_and_errors_are_not_cached() {
        let disabled = CompiledFilterCache::new(0);
        disabled.insert(key(&["Table"], "a"), Arc::new(CompiledCriteria::default()));
        assert!(disabled.is_empty());

        let cache = CompiledFilterCache::new(2);
        let result = cache.get_or_compile(key(&["Table"], "a"), || {
            Err(SearchError::invalid_filter("name = 'a'", "boom"))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
