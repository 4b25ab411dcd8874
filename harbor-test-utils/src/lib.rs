//! HARBOR Test Utilities
//!
//! Shared test infrastructure for the HARBOR workspace:
//! - Mock transports, durable tiers, decoders and apply targets
//! - Proptest generators for keys and payloads
//! - Test fixtures for common scenarios
//! - Custom assertions for HARBOR-specific validation

pub use harbor_core::{
    AssetRef, AssetTarget, Bytes, CacheConfig, CacheKey, DecodeError, Decoder, DurableCache,
    HarborError, HarborResult, StorageError, Transport, TransportError,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Holds fetches until the test lets them through.
#[derive(Debug, Clone)]
pub struct FetchGate(Arc<Semaphore>);

impl FetchGate {
    /// A gate that blocks every fetch.
    pub fn closed() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    /// Let `n` more fetches through.
    pub fn open(&self, n: usize) {
        self.0.add_permits(n);
    }

    /// Let every current and future fetch through.
    pub fn open_all(&self) {
        self.0.add_permits(1 << 20);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

/// Scripted transport that counts calls per URL.
///
/// URLs without a configured response fail with `TransportError::Request`.
/// The timeout passed by the cache is honored, so a delay longer than the
/// configured fetch timeout produces `TransportError::Timeout`.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: RwLock<HashMap<String, Bytes>>,
    statuses: RwLock<HashMap<String, u16>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    gate: Option<FetchGate>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: impl Into<String>, payload: Bytes) -> Self {
        self.set_response(url, payload);
        self
    }

    /// Answer `url` with a non-success HTTP status.
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        if let Ok(mut statuses) = self.statuses.write() {
            statuses.insert(url.into(), status);
        }
        self
    }

    /// Sleep before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block each fetch on `gate` before answering.
    pub fn with_gate(mut self, gate: FetchGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Change the response for `url` after construction.
    pub fn set_response(&self, url: impl Into<String>, payload: Bytes) {
        let url = url.into();
        if let Ok(mut statuses) = self.statuses.write() {
            statuses.remove(&url);
        }
        if let Ok(mut responses) = self.responses.write() {
            responses.insert(url, payload);
        }
    }

    /// Make `url` unreachable again.
    pub fn remove_response(&self, url: &str) {
        if let Ok(mut responses) = self.responses.write() {
            responses.remove(url);
        }
    }

    /// Fetches started for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Fetches started for any URL.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    fn record_call(&self, url: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(url.to_string()).or_insert(0) += 1;
        }
    }

    fn respond(&self, url: &str) -> Result<Bytes, TransportError> {
        if let Some(status) = self
            .statuses
            .read()
            .ok()
            .and_then(|statuses| statuses.get(url).copied())
        {
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
            });
        }

        self.responses
            .read()
            .ok()
            .and_then(|responses| responses.get(url).cloned())
            .ok_or_else(|| TransportError::Request {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, TransportError> {
        self.record_call(url);
        let work = async {
            if let Some(gate) = &self.gate {
                gate.pass().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.respond(url)
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }
}

// ============================================================================
// MOCK DURABLE CACHE
// ============================================================================

/// Durable tier that counts every call and can be told to fail reads.
#[derive(Debug, Default)]
pub struct MockDurableCache {
    entries: RwLock<HashMap<String, Bytes>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    removes: AtomicUsize,
    clears: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MockDurableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload without counting it as a `put`.
    pub fn seed(&self, key: &str, payload: Bytes) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), payload);
        }
    }

    pub fn payload(&self, key: &str) -> Option<Bytes> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.payload(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent read return a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Async `get` calls so far (excludes `get_now`).
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn read(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend {
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key.as_str()).cloned())
    }
}

#[async_trait]
impl DurableCache for MockDurableCache {
    async fn get(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.read(key)
    }

    fn get_now(&self, key: &CacheKey) -> HarborResult<Option<Bytes>> {
        self.read(key)
    }

    async fn put(&self, key: &CacheKey, payload: Bytes) -> HarborResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.to_string(), payload);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> HarborResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.remove(key.as_str());
        Ok(())
    }

    async fn clear(&self) -> HarborResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.clear();
        Ok(())
    }
}

// ============================================================================
// MOCK DECODER AND TARGET
// ============================================================================

/// Decodes payloads as UTF-8 text. Invalid UTF-8 is a decode failure.
#[derive(Debug, Clone, Copy)]
pub struct Utf8Decoder {
    reencode: bool,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self { reencode: true }
    }

    /// A decoder whose assets cannot be written back to the durable tier.
    pub fn without_encode() -> Self {
        Self { reencode: false }
    }
}

impl Default for Utf8Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Utf8Decoder {
    type Asset = String;

    fn decode(&self, payload: &Bytes) -> Result<String, DecodeError> {
        String::from_utf8(payload.to_vec()).map_err(|e| DecodeError::new(e.to_string()))
    }

    fn encode(&self, asset: &String) -> Option<Bytes> {
        self.reencode.then(|| Bytes::from(asset.clone()))
    }
}

/// Apply target that records every asset it receives.
#[derive(Debug)]
pub struct RecordingTarget<A> {
    applied: Mutex<Vec<AssetRef<A>>>,
    alive: AtomicBool,
}

impl<A> RecordingTarget<A> {
    pub fn new() -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
        }
    }

    /// Tear the target down; later loads must not apply to it.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Assets applied so far, oldest first.
    pub fn applied(&self) -> Vec<AssetRef<A>> {
        self.applied
            .lock()
            .map(|applied| applied.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<AssetRef<A>> {
        self.applied().pop()
    }
}

impl<A> Default for RecordingTarget<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + Sync> AssetTarget<A> for RecordingTarget<A> {
    fn apply(&self, asset: AssetRef<A>) {
        if let Ok(mut applied) = self.applied.lock() {
            applied.push(asset);
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys and payloads.

    use super::*;
    use proptest::prelude::*;

    /// Generate an asset URL on a small set of hosts.
    pub fn arb_url() -> impl Strategy<Value = String> {
        (
            prop_oneof![Just("cdn.example.com"), Just("assets.example.org")],
            "[a-z0-9]{1,12}",
            prop_oneof![Just("png"), Just("jpg"), Just("bin")],
        )
            .prop_map(|(host, name, ext)| format!("https://{host}/{name}.{ext}"))
    }

    /// Generate a valid cache key.
    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        arb_url().prop_filter_map("non-empty key", |url| CacheKey::new(&url))
    }

    /// Generate a non-empty payload.
    pub fn arb_payload() -> impl Strategy<Value = Bytes> {
        prop::collection::vec(any::<u8>(), 1..256).prop_map(Bytes::from)
    }

    /// Generate a small pool of distinct URLs.
    pub fn arb_url_pool(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::hash_set(arb_url(), 1..=max.max(1))
            .prop_map(|urls| urls.into_iter().collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// Deterministic URL for index `i`.
    pub fn sample_url(i: usize) -> String {
        format!("https://cdn.example.com/assets/{i}.png")
    }

    /// Payload whose text names its URL, for asserting which fetch produced it.
    pub fn sample_payload(url: &str) -> Bytes {
        Bytes::from(format!("payload:{url}"))
    }

    /// A config with the given memory capacity and a short fetch timeout.
    pub fn config_with_capacity(capacity: usize) -> CacheConfig {
        CacheConfig::default()
            .with_memory_capacity(capacity)
            .with_fetch_timeout(Duration::from_secs(2))
    }

    /// A transport answering `sample_url(0..count)` with `sample_payload`.
    pub fn transport_for(count: usize) -> MockTransport {
        (0..count).fold(MockTransport::new(), |transport, i| {
            let url = sample_url(i);
            let payload = sample_payload(&url);
            transport.with_response(url, payload)
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for HARBOR-specific validation.

    use super::*;

    /// Assert that two loads returned the very same asset instance.
    #[track_caller]
    pub fn assert_same_asset<A: std::fmt::Debug>(a: &AssetRef<A>, b: &AssetRef<A>) {
        assert!(
            Arc::ptr_eq(a, b),
            "Expected one shared asset, got two instances: {:?} / {:?}",
            a,
            b
        );
    }

    /// Assert that a HarborResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &HarborResult<T>) {
        match result {
            Err(HarborError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a HarborResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &HarborResult<T>) {
        match result {
            Err(HarborError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
