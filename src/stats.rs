//! Map Statistics Module
//!
//! Tracks lookup and eviction counters for both map kinds.

use serde::Serialize;

// == Map Stats ==
/// Lookup and eviction counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MapStats {
    /// Lookups that found a live value
    pub hits: u64,
    /// Lookups that found nothing (never set, deleted, expired or collected)
    pub misses: u64,
    /// Entries removed because a read or sweep found them stale
    pub lazy_evictions: u64,
    /// Entries removed by an eviction timer
    pub scheduled_evictions: u64,
    /// Entries physically stored right now
    pub total_entries: usize,
}

impl MapStats {
    // == Constructor ==
    /// Creates a new MapStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total entries removed for staleness by either path.
    pub fn evictions(&self) -> u64 {
        self.lazy_evictions + self.scheduled_evictions
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn record_lazy_eviction(&mut self) {
        self.lazy_evictions += 1;
    }

    pub(crate) fn record_scheduled_eviction(&mut self) {
        self.scheduled_evictions += 1;
    }

    pub(crate) fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
