//! Process-local durable tier.
//!
//! Useful for hosts without a writable disk and for tests. Contents live as
//! long as the value does.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use harbor_core::{CacheKey, DurableCache, HarborResult, StorageError};

/// `DurableCache` over a locked `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryDurableCache {
    entries: RwLock<HashMap<CacheKey, Bytes>>,
}

impl InMemoryDurableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }
}

#[async_trait]
impl DurableCache for InMemoryDurableCache {
    async fn get(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        self.read(key)
    }

    fn get_now(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        self.read(key)
    }

    async fn put(&self, key: &CacheKey, payload: Bytes) -> HarborResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.clone(), payload);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> HarborResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> HarborResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.clear();
        Ok(())
    }
}
