//! Local Store Module
//!
//! Concurrent key-value storage with per-entry expiration and lazy eviction on read.

use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::CacheEntry;

// == Local Store ==
/// Node-local cache storage.
///
/// Backed by a sharded `DashMap`, so unrelated keys never contend on a
/// single lock and no reader can observe a half-written entry.
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: DashMap<String, CacheEntry>,
}

impl LocalStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores a key-value pair, overwriting any previous entry and its TTL.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Time to live; `None` or zero means the entry never expires
    pub fn set(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl: Option<Duration>) {
        self.entries
            .insert(key.into(), CacheEntry::new(value.into(), ttl));
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// An expired entry is removed as a side effect and reported as absent.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired_at(now) {
                return Some(entry.value.clone());
            }
        }

        // Re-check under the shard lock: a concurrent set may have refreshed it
        self.entries
            .remove_if(key, |_, entry| entry.is_expired_at(now));
        None
    }

    // == Delete ==
    /// Removes an entry by key. Missing keys are ignored.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    // == Contains Key ==
    /// Returns true if an entry (expired or not) is physically present.
    ///
    /// Unlike [`get`](Self::get) this never evicts.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    // == Length ==
    /// Returns the number of physically present entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
