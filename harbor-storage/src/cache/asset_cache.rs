//! Two-tier asset cache with single-flight fetch coordination.
//!
//! This module implements the orchestration policy: a load is answered from
//! the memory tier, or joins a pipeline already fetching the same key, or
//! starts a new pipeline (durable tier, then network, then decode) whose
//! result populates the cheaper tiers for the next caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use harbor_core::{
    AssetRef, AssetTarget, CacheConfig, CacheError, CacheKey, Decoder, DurableCache, Transport,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::coordinator::{FetchCoordinator, FetchOutcome, FlightId, SharedFetch};
use super::memory_tier::MemoryTier;
use super::stats::{CacheStats, StatsRecorder};

/// How a load treats entries that are already cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Serve from memory or the durable tier when possible.
    #[default]
    PreferCache,
    /// Skip both tiers and fetch from the network.
    ///
    /// A forced load that finds a pipeline already running for the key joins
    /// it, so it may receive a result fetched without the bypass.
    ForceRefresh,
}

/// Mutable state guarded by the cache's single mutex.
struct CacheState<A> {
    memory: MemoryTier<A>,
    pending: FetchCoordinator<A>,
    disposed: bool,
}

/// What a load does after the locked bookkeeping step.
enum Admission<A> {
    Ready(FetchOutcome<A>),
    Await(SharedFetch<A>),
}

struct CacheInner<D: Decoder> {
    config: CacheConfig,
    decoder: D,
    transport: Arc<dyn Transport>,
    durable: Option<Arc<dyn DurableCache>>,
    state: Mutex<CacheState<D::Asset>>,
    stats: StatsRecorder,
    /// Number of background durable writes still running.
    writes: Arc<watch::Sender<usize>>,
}

/// Keyed asset cache backed by a memory tier, an optional durable tier and
/// a network transport.
///
/// Clones share the same tiers and pending-fetch registry. Methods that start
/// background work (`load`, `load_into`, `save_to_cache`) spawn tokio tasks
/// and must be called from within a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let cache = AssetCache::new(
///     CacheConfig::default(),
///     RawBytesDecoder,
///     Arc::new(HttpTransport::new(&HttpConfig::default())?),
///     Some(Arc::new(LmdbDurableCache::new("/var/cache/harbor", 256)?)),
/// );
///
/// // Concurrent loads of the same URL share one network fetch.
/// let (a, b) = tokio::join!(cache.load(url), cache.load(url));
/// ```
pub struct AssetCache<D: Decoder> {
    inner: Arc<CacheInner<D>>,
}

impl<D: Decoder> Clone for AssetCache<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Decoder> AssetCache<D> {
    /// Create a cache. Without a durable tier the cache is memory-only.
    pub fn new(
        config: CacheConfig,
        decoder: D,
        transport: Arc<dyn Transport>,
        durable: Option<Arc<dyn DurableCache>>,
    ) -> Self {
        let (writes, _) = watch::channel(0usize);
        let state = CacheState {
            memory: MemoryTier::new(config.memory_capacity),
            pending: FetchCoordinator::new(),
            disposed: false,
        };
        Self {
            inner: Arc::new(CacheInner {
                config,
                decoder,
                transport,
                durable,
                state: Mutex::new(state),
                stats: StatsRecorder::default(),
                writes: Arc::new(writes),
            }),
        }
    }

    /// Create a memory-only cache.
    pub fn memory_only(config: CacheConfig, decoder: D, transport: Arc<dyn Transport>) -> Self {
        Self::new(config, decoder, transport, None)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn has_durable(&self) -> bool {
        self.inner.durable.is_some()
    }

    /// Load `key`, preferring cached copies.
    pub async fn load(&self, key: &str) -> Option<AssetRef<D::Asset>> {
        self.load_with(key, LoadPolicy::PreferCache).await
    }

    /// Load `key` under the given policy.
    ///
    /// Returns `None` for an empty key, after disposal, or when every tier
    /// failed. Failures are logged, never returned.
    pub async fn load_with(&self, key: &str, policy: LoadPolicy) -> Option<AssetRef<D::Asset>> {
        let key = CacheKey::new(key)?;
        match self.inner.admit(&key, policy) {
            Admission::Ready(outcome) => outcome,
            Admission::Await(fetch) => fetch.await,
        }
    }

    /// Fire-and-forget load that applies the asset to `target`.
    ///
    /// The placeholder is applied right away. The loaded asset is applied
    /// only if the target is still alive when the load finishes; the task
    /// holds a weak reference so it never keeps the target around. Returns
    /// the task handle, or `None` for an empty key.
    pub fn load_into<T>(
        &self,
        key: &str,
        target: &Arc<T>,
        placeholder: Option<AssetRef<D::Asset>>,
        policy: LoadPolicy,
    ) -> Option<JoinHandle<()>>
    where
        T: AssetTarget<D::Asset> + ?Sized + 'static,
    {
        if let Some(placeholder) = placeholder {
            target.apply(placeholder);
        }
        if key.is_empty() {
            return None;
        }

        let cache = self.clone();
        let key = key.to_string();
        let target = Arc::downgrade(target);
        Some(tokio::spawn(async move {
            let Some(asset) = cache.load_with(&key, policy).await else {
                return;
            };
            match target.upgrade() {
                Some(target) if target.is_alive() => target.apply(asset),
                _ => tracing::debug!(key = %key, "Target gone before load finished, discarding asset"),
            }
        }))
    }

    /// Whether `key` is in memory or the durable tier. Never fetches.
    pub fn is_cached(&self, key: &str) -> bool {
        let Some(key) = CacheKey::new(key) else {
            return false;
        };
        {
            let state = self.inner.lock_state();
            if state.disposed {
                return false;
            }
            if state.memory.contains(&key) {
                return true;
            }
        }

        let Some(durable) = &self.inner.durable else {
            return false;
        };
        match durable.get_now(&key) {
            Ok(Some(payload)) => !payload.is_empty(),
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Durable lookup failed");
                false
            }
        }
    }

    /// Read `key` from memory, then the durable tier. Never calls the transport.
    ///
    /// A durable hit is decoded and promoted into the memory tier.
    pub async fn get_from_cache(&self, key: &str) -> Option<AssetRef<D::Asset>> {
        let key = CacheKey::new(key)?;
        {
            let state = self.inner.lock_state();
            if state.disposed {
                return None;
            }
            if let Some(asset) = state.memory.get(&key) {
                self.inner.stats.memory_hit();
                return Some(asset);
            }
        }

        let asset = self.inner.read_durable(&key).await?;
        self.inner.stats.durable_hit();
        Some(self.inner.promote(&key, Arc::new(asset)))
    }

    /// Insert an externally produced asset.
    ///
    /// The memory tier is populated immediately. If the decoder can re-encode
    /// the asset, the bytes are written to the durable tier in the background.
    pub fn save_to_cache(&self, key: &str, asset: impl Into<AssetRef<D::Asset>>) {
        let Some(key) = CacheKey::new(key) else {
            return;
        };
        if self.inner.lock_state().disposed {
            return;
        }

        let asset = asset.into();
        let encoded = self.inner.decoder.encode(&asset);
        self.inner.promote(&key, asset);
        if let Some(payload) = encoded {
            self.inner.persist_in_background(key, payload);
        }
    }

    /// Drop every memory entry and clear the durable tier. Ignored after disposal.
    pub async fn clear_cache(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.disposed {
                return;
            }
            state.memory.clear();
        }
        if let Some(durable) = &self.inner.durable {
            if let Err(e) = durable.clear().await {
                tracing::warn!(error = %e, "Failed to clear durable cache");
            }
        }
    }

    /// Drop `key` from memory and the durable tier. Ignored after disposal.
    pub async fn clear_key(&self, key: &str) {
        let Some(key) = CacheKey::new(key) else {
            return;
        };
        {
            let mut state = self.inner.lock_state();
            if state.disposed {
                return;
            }
            state.memory.remove(&key);
        }
        if let Some(durable) = &self.inner.durable {
            if let Err(e) = durable.remove(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove durable entry");
            }
        }
    }

    /// Wait until every background durable write started so far has finished.
    pub async fn flush_durable_writes(&self) {
        let mut writes = self.inner.writes.subscribe();
        if writes.wait_for(|running| *running == 0).await.is_err() {
            tracing::debug!("Durable write counter closed");
        }
    }

    /// Release every memory entry and forget in-flight pipelines.
    ///
    /// Running pipelines are not aborted, but their results are no longer
    /// stored. Afterwards reads return nothing and writes are ignored.
    pub fn dispose(&self) {
        let mut state = self.inner.lock_state();
        let released = state.memory.len();
        state.memory.clear();
        state.pending.clear();
        state.disposed = true;
        tracing::info!(released, "Asset cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock_state().disposed
    }

    pub fn memory_len(&self) -> usize {
        self.inner.lock_state().memory.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// Whether a pipeline is currently fetching `key`.
    pub fn is_fetching(&self, key: &str) -> bool {
        CacheKey::new(key).is_some_and(|key| self.inner.lock_state().pending.is_pending(&key))
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, pending) = {
            let state = self.inner.lock_state();
            (state.memory.len(), state.pending.len())
        };
        self.inner.stats.snapshot(entries, pending)
    }
}

impl<D: Decoder> CacheInner<D> {
    fn lock_state(&self) -> MutexGuard<'_, CacheState<D::Asset>> {
        // The state is plain data that is consistent between statements.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locked bookkeeping for a load: memory hit, join, or start a pipeline.
    fn admit(self: &Arc<Self>, key: &CacheKey, policy: LoadPolicy) -> Admission<D::Asset> {
        let mut state = self.lock_state();
        if state.disposed {
            return Admission::Ready(None);
        }

        if policy == LoadPolicy::PreferCache {
            if let Some(asset) = state.memory.get(key) {
                self.stats.memory_hit();
                tracing::trace!(key = %key, "Memory tier hit");
                return Admission::Ready(Some(asset));
            }
        }

        if let Some(fetch) = state.pending.join(key) {
            self.stats.joined_load();
            tracing::debug!(key = %key, "Joining in-flight fetch");
            return Admission::Await(fetch);
        }

        let flight_id = state.pending.next_flight_id();
        let task = tokio::spawn(Arc::clone(self).run_pipeline(key.clone(), flight_id, policy));
        let weak = Arc::downgrade(self);
        let retire_key = key.clone();
        let fetch = task
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    tracing::warn!(key = %retire_key, error = %e, "Fetch pipeline task failed");
                    if let Some(inner) = weak.upgrade() {
                        inner.stats.failure();
                        inner.lock_state().pending.retire(&retire_key, flight_id);
                    }
                    None
                })
            })
            .boxed()
            .shared();
        state.pending.register(key.clone(), flight_id, fetch.clone());
        Admission::Await(fetch)
    }

    /// Run one pipeline to completion and retire its registration.
    async fn run_pipeline(
        self: Arc<Self>,
        key: CacheKey,
        flight_id: FlightId,
        policy: LoadPolicy,
    ) -> FetchOutcome<D::Asset> {
        let outcome = match self.fetch_pipeline(&key, policy).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                self.stats.failure();
                tracing::warn!(key = %key, error = %e, "Asset load failed");
                None
            }
        };
        self.lock_state().pending.retire(&key, flight_id);
        outcome
    }

    /// Durable tier, then network, then decode and populate.
    async fn fetch_pipeline(
        &self,
        key: &CacheKey,
        policy: LoadPolicy,
    ) -> Result<AssetRef<D::Asset>, CacheError> {
        if policy == LoadPolicy::PreferCache {
            if let Some(asset) = self.read_durable(key).await {
                self.stats.durable_hit();
                tracing::debug!(key = %key, "Durable tier hit");
                return Ok(self.promote(key, Arc::new(asset)));
            }
        }

        self.stats.network_fetch();
        let payload = self
            .transport
            .fetch(key.as_str(), self.config.fetch_timeout())
            .await
            .map_err(|e| CacheError::TransportFailure {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let asset = self
            .decoder
            .decode(&payload)
            .map_err(|e| CacheError::DecodeFailure {
                key: key.to_string(),
                reason: e.reason,
            })?;

        let asset = self.promote(key, Arc::new(asset));
        self.persist_in_background(key.clone(), payload);
        Ok(asset)
    }

    /// Decoded durable payload for `key`, or `None` on miss, error or bad bytes.
    async fn read_durable(&self, key: &CacheKey) -> Option<D::Asset> {
        let durable = self.durable.as_ref()?;
        let payload = match durable.get(key).await {
            Ok(Some(payload)) if !payload.is_empty() => payload,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Durable read failed, treating as miss");
                return None;
            }
        };

        match self.decoder.decode(&payload) {
            Ok(asset) => Some(asset),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Durable payload failed to decode, treating as miss");
                None
            }
        }
    }

    /// Insert into the memory tier unless disposed. Returns the asset.
    fn promote(&self, key: &CacheKey, asset: AssetRef<D::Asset>) -> AssetRef<D::Asset> {
        let evicted = {
            let mut state = self.lock_state();
            if state.disposed {
                return asset;
            }
            state.memory.put(key.clone(), Arc::clone(&asset))
        };

        if let Some((evicted_key, _)) = evicted {
            self.stats.eviction();
            tracing::debug!(key = %evicted_key, "Evicted from memory tier");
        }
        asset
    }

    /// Best-effort durable write on a background task.
    fn persist_in_background(&self, key: CacheKey, payload: harbor_core::Bytes) {
        let Some(durable) = self.durable.clone() else {
            return;
        };

        let guard = WriteGuard::start(Arc::clone(&self.writes));
        tokio::spawn(async move {
            if let Err(e) = durable.put(&key, payload).await {
                tracing::warn!(key = %key, error = %e, "Background durable write failed");
            }
            drop(durable);
            drop(guard);
        });
    }
}

/// Counts one background write for `flush_durable_writes`, even on panic.
struct WriteGuard(Arc<watch::Sender<usize>>);

impl WriteGuard {
    fn start(writes: Arc<watch::Sender<usize>>) -> Self {
        writes.send_modify(|running| *running += 1);
        Self(writes)
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.0.send_modify(|running| *running = running.saturating_sub(1));
    }
}
