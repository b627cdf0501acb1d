//! Cache Statistics Module
//!
//! Tracks where lookups were answered: local store, owning peer, origin, or nowhere.

use std::sync::atomic::{AtomicU64, Ordering};

// == Cache Stats ==
/// Point-in-time snapshot of lookup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the local store
    pub local_hits: u64,
    /// Lookups answered by the owning peer
    pub peer_hits: u64,
    /// Lookups answered by the origin
    pub origin_hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Failed peer requests
    pub peer_errors: u64,
    /// Failed origin fetches
    pub origin_errors: u64,
    /// Entries physically present in the local store
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Fraction of lookups answered by any stage, or 0.0 with no lookups yet.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.local_hits + self.peer_hits + self.origin_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by concurrent lookups.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    local_hits: AtomicU64,
    peer_hits: AtomicU64,
    origin_hits: AtomicU64,
    misses: AtomicU64,
    peer_errors: AtomicU64,
    origin_errors: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_hit(&self) {
        self.peer_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_hit(&self) {
        self.origin_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_error(&self) {
        self.origin_errors.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Reads all counters. Counters are independent, so a snapshot taken
    /// under load may be off by in-flight lookups.
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            peer_hits: self.peer_hits.load(Ordering::Relaxed),
            origin_hits: self.origin_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            origin_errors: self.origin_errors.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
