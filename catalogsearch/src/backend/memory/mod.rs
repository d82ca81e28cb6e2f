// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory backends for embedding, the CLI and tests

pub mod dataset;
pub mod graph;
pub mod index;

pub use dataset::{Dataset, IndexSettings, LoadedDataset};
pub use graph::InMemoryGraph;
pub use index::InMemoryIndex;

use super::SortSpec;
use crate::model::{EntityRecord, SortOrder};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Call statistics for an in-memory backend
#[derive(Debug, Default)]
pub struct BackendStats {
    calls: AtomicU64,
    records_returned: AtomicU64,
}

impl BackendStats {
    pub(crate) fn record_call(&self, returned: usize) {
        self.calls.fetch_add(1, AtomicOrdering::Relaxed);
        self.records_returned
            .fetch_add(returned as u64, AtomicOrdering::Relaxed);
    }

    /// Number of query calls served
    pub fn calls(&self) -> u64 {
        self.calls.load(AtomicOrdering::Relaxed)
    }

    pub fn records_returned(&self) -> u64 {
        self.records_returned.load(AtomicOrdering::Relaxed)
    }

    pub fn reset(&self) {
        self.calls.store(0, AtomicOrdering::Relaxed);
        self.records_returned.store(0, AtomicOrdering::Relaxed);
    }
}

/// Order two records on a sort key; records missing the key sort last in
/// either direction
pub(crate) fn compare_records(a: &EntityRecord, b: &EntityRecord, sort: &SortSpec) -> Ordering {
    let left = a.property(&sort.property).filter(|v| !v.is_null());
    let right = b.property(&sort.property).filter(|v| !v.is_null());
    match (left, right) {
        (Some(x), Some(y)) => {
            let ord = x.compare(&y).unwrap_or(Ordering::Equal);
            match sort.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sort_keys_go_last() {
        let mut records = vec![
            EntityRecord::new("a", "Table"),
            EntityRecord::new("b", "Table").with_attribute("Asset.name", "zeta"),
            EntityRecord::new("c", "Table").with_attribute("Asset.name", "alpha"),
        ];

        let asc = SortSpec::new("Asset.name", SortOrder::Ascending);
        records.sort_by(|x, y| compare_records(x, y, &asc));
        let guids: Vec<&str> = records.iter().map(|r| r.guid.as_str()).collect();
        assert_eq!(guids, vec!["c", "b", "a"]);

        let desc = SortSpec::new("Asset.name", SortOrder::Descending);
        records.sort_by(|x, y| compare_records(x, y, &desc));
        let guids: Vec<&str> = records.iter().map(|r| r.guid.as_str()).collect();
        assert_eq!(guids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_stats() {
        let stats = BackendStats::default();
        stats.record_call(3);
        stats.record_call(0);
        assert_eq!(stats.calls(), 2);
        assert_eq!(stats.records_returned(), 3);
        stats.reset();
        assert_eq!(stats.calls(), 0);
    }
}
