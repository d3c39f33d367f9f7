use serde::{Serialize, Deserialize};
use crate::query::engine::QueryStats;
use crate::query::random_cache::CacheStats;

/// Outcome of one bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub total: usize,
    pub accepted: usize,
    pub oversized: usize,
    pub duplicates: usize,
    /// Distinct words and author keys written by the load.
    pub index_entries: usize,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.oversized + self.duplicates
    }
}

/// Sizes of the on-disk store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: usize,
    pub index_entries: usize,
    pub max_id: u64,
    pub file_bytes: u64,
}

/// Database statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub store: StoreStats,
    pub queries: QueryStats,
    pub cache: CacheStats,
}
