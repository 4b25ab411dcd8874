//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache activity since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads answered from the memory tier.
    pub memory_hits: u64,
    /// Pipelines answered from the durable tier.
    pub durable_hits: u64,
    /// Transport fetches started.
    pub network_fetches: u64,
    /// Loads that joined an already running pipeline.
    pub joined_loads: u64,
    /// Pipelines that ended without an asset.
    pub failures: u64,
    /// Entries evicted from the memory tier due to capacity.
    pub evictions: u64,
    /// Entries currently in the memory tier.
    pub entry_count: u64,
    /// Pipelines currently registered.
    pub pending_fetches: u64,
}

impl CacheStats {
    /// Fraction of resolved loads that avoided the network (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits;
        let total = hits + self.network_fetches;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
    network_fetches: AtomicU64,
    joined_loads: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn durable_hit(&self) {
        self.durable_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn joined_load(&self) {
        self.joined_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: usize, pending_fetches: usize) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            joined_loads: self.joined_loads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
            pending_fetches: pending_fetches as u64,
        }
    }
}
