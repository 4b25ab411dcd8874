//! LMDB-backed durable tier.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep fetched payloads in
//! a memory-mapped key-value store that survives restarts. Keys are the
//! UTF-8 bytes of the cache key; values are the raw payload exactly as the
//! transport returned it.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get` and `get_now`
//! - Write transactions for `put`, `remove` and `clear`

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use harbor_core::{CacheKey, DurableCache, HarborError, HarborResult, StorageError};
use heed::types::Bytes as RawBytes;
use heed::{Database, Env, EnvOpenOptions};

/// Error type for LMDB durable cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for HarborError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Io(io) => HarborError::Storage(StorageError::Io {
                reason: io.to_string(),
            }),
            other => HarborError::Storage(StorageError::Backend {
                reason: other.to_string(),
            }),
        }
    }
}

/// Durable tier stored in an LMDB environment on disk.
///
/// # Example
///
/// ```ignore
/// use harbor_storage::cache::LmdbDurableCache;
///
/// let durable = LmdbDurableCache::new("/var/cache/harbor", 256)?;
/// durable.put(&key, payload).await?;
/// assert!(durable.get(&key).await?.is_some());
/// ```
pub struct LmdbDurableCache {
    env: Env,
    db: Database<RawBytes, RawBytes>,
}

impl LmdbDurableCache {
    /// Open (or create) the store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        let map_size = max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbCacheError::EnvOpen(format!("map size of {max_size_mb} MB overflows usize"))
        })?;
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this
        // process and is not truncated while mapped.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<RawBytes, RawBytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB durable cache");
        Ok(Self { env, db })
    }

    /// Number of stored payloads.
    pub fn len(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .len(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, LmdbCacheError> {
        Ok(self.len()? == 0)
    }

    fn read(&self, key: &CacheKey) -> Result<Option<Bytes>, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let value = self
            .db
            .get(&rtxn, key.as_str().as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        // Copy out before the read transaction ends.
        Ok(value.map(Bytes::copy_from_slice))
    }
}

#[async_trait]
impl DurableCache for LmdbDurableCache {
    async fn get(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        Ok(self.read(key)?)
    }

    fn get_now(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        Ok(self.read(key)?)
    }

    async fn put(&self, key: &CacheKey, payload: Bytes) -> HarborResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key.as_str().as_bytes(), &payload)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> HarborResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .delete(&mut wtxn, key.as_str().as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> HarborResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .clear(&mut wtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }
}
