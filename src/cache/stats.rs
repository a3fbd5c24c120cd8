//! Engine Statistics Module
//!
//! Counts what the cache engine did with each request.

use serde::Serialize;

// == Engine Stats ==
/// Per-process counters of engine outcomes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Pages served from the store
    pub hits: u64,
    /// Cacheable requests that had to render
    pub misses: u64,
    /// Captured pages written to the store
    pub stores: u64,
    /// Requests left untouched (rules, no session, mutations, malformed output)
    pub passthroughs: u64,
    /// Prefetch probes answered without a body
    pub prefetches: u64,
    /// Prefetch probes refused
    pub rejections: u64,
}

impl EngineStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing cacheable was requested.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_store(&mut self) {
        self.stores += 1;
    }

    pub fn record_passthrough(&mut self) {
        self.passthroughs += 1;
    }

    pub fn record_prefetch(&mut self) {
        self.prefetches += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }
}
