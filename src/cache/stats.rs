//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and expirations.

use serde::Serialize;

// == Cache Metrics ==
/// Monotonic counters for a single cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetrics {
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads that found nothing, or only an expired entry
    pub misses: u64,
    /// Entries dropped to make room for a new key
    pub evictions: u64,
    /// Entries dropped because their TTL ran out
    pub expirations: u64,
}

impl CacheMetrics {
    // == Constructor ==
    /// Creates a new CacheMetrics with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Hit rate as a percentage in `[0, 100]`, or 0.0 if nothing was read yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }
}

// == Cache Stats ==
/// Point-in-time snapshot of a cache: occupancy plus its counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries currently stored (expired-but-unswept included)
    pub size: usize,
    /// Maximum entries, 0 = unlimited
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Percentage of reads that were hits
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(size: usize, capacity: usize, metrics: CacheMetrics) -> Self {
        Self {
            size,
            capacity,
            hits: metrics.hits,
            misses: metrics.misses,
            evictions: metrics.evictions,
            expirations: metrics.expirations,
            hit_rate: metrics.hit_rate(),
        }
    }
}
