//! Bounded in-process tier of decoded assets with FIFO eviction.
//!
//! The tier is plain data: it has no lock of its own. `AssetCache` owns it
//! inside the same mutex as the pending-fetch registry so both structures
//! change together.

use std::collections::{HashMap, VecDeque};

use harbor_core::{AssetRef, CacheKey};

/// Insertion-ordered map from key to decoded asset.
///
/// Invariant: `len() <= capacity()` after every call returns. When a new key
/// arrives at capacity, the oldest-inserted entry is evicted. Reads never
/// extend an entry's life.
#[derive(Debug)]
pub struct MemoryTier<A> {
    entries: HashMap<CacheKey, AssetRef<A>>,
    /// Keys in insertion order, front is oldest.
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl<A> MemoryTier<A> {
    /// Create an empty tier. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<AssetRef<A>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace the entry for `key`.
    ///
    /// Replacing keeps the key's original position and drops the old asset.
    /// Inserting a new key at capacity evicts the oldest entry and returns it.
    pub fn put(&mut self, key: CacheKey, asset: AssetRef<A>) -> Option<(CacheKey, AssetRef<A>)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = asset;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, asset);
        evicted
    }

    /// Remove `key`. Linear in the capacity, which config validation bounds.
    pub fn remove(&mut self, key: &CacheKey) -> Option<AssetRef<A>> {
        let asset = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(asset)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.order.iter()
    }

    fn evict_oldest(&mut self) -> Option<(CacheKey, AssetRef<A>)> {
        while let Some(oldest) = self.order.pop_front() {
            if let Some(asset) = self.entries.remove(&oldest) {
                return Some((oldest, asset));
            }
        }
        None
    }
}
