//! Collaborator traits consumed by the asset cache.
//!
//! The cache core never talks to the network, the disk or a decoder
//! directly. Each of those is a trait here, so hosts can plug in their own
//! HTTP stack, persistence layer and asset format.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{DecodeError, HarborResult, TransportError};
use crate::key::CacheKey;

/// Shared reference to a decoded asset.
///
/// The memory tier keeps one clone; every caller that receives the asset
/// gets another. Dropping the tier's clone is what "releasing" an entry means.
pub type AssetRef<A> = Arc<A>;

/// Fetches raw bytes for a URL.
///
/// The cache only distinguishes success from failure and never branches on
/// the error kind.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the payload at `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, TransportError>;
}

/// Durable key to bytes store backing the memory tier.
///
/// # Contract
///
/// - `get` after `put` returns what was put, until `remove` or `clear`.
/// - An empty payload is treated by the cache as absent.
/// - Implementations must be thread-safe; the cache calls them from
///   spawned tasks.
#[async_trait]
pub trait DurableCache: Send + Sync {
    /// Read the payload stored under `key`.
    async fn get(&self, key: &CacheKey) -> HarborResult<Option<Bytes>>;

    /// Synchronous read used by `is_cached`, which must not suspend.
    fn get_now(&self, key: &CacheKey) -> HarborResult<Option<Bytes>>;

    /// Store `payload` under `key`, replacing any previous value.
    async fn put(&self, key: &CacheKey, payload: Bytes) -> HarborResult<()>;

    /// Remove the payload stored under `key`. Missing keys are not an error.
    async fn remove(&self, key: &CacheKey) -> HarborResult<()>;

    /// Remove every payload.
    async fn clear(&self) -> HarborResult<()>;
}

/// Turns raw payload bytes into an in-memory asset.
pub trait Decoder: Send + Sync + 'static {
    /// The decoded asset type.
    type Asset: Send + Sync + 'static;

    /// Decode a payload. Malformed payloads return [`DecodeError`].
    fn decode(&self, payload: &Bytes) -> Result<Self::Asset, DecodeError>;

    /// Re-encode an asset for durable storage.
    ///
    /// Returns `None` when the asset cannot be turned back into bytes, in
    /// which case `save_to_cache` only populates the memory tier.
    fn encode(&self, _asset: &Self::Asset) -> Option<Bytes> {
        None
    }
}

/// Something a loaded asset can be applied to (a sprite, a texture slot).
pub trait AssetTarget<A>: Send + Sync {
    /// Apply the asset (or placeholder) to this target.
    fn apply(&self, asset: AssetRef<A>);

    /// Whether the target can still accept an asset.
    ///
    /// Targets that are torn down while still referenced return `false`.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Identity decoder: the asset is the payload itself.
///
/// Empty payloads are rejected so they never populate the memory tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBytesDecoder;

impl Decoder for RawBytesDecoder {
    type Asset = Bytes;

    fn decode(&self, payload: &Bytes) -> Result<Bytes, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::new("empty payload"));
        }
        Ok(payload.clone())
    }

    fn encode(&self, asset: &Bytes) -> Option<Bytes> {
        Some(asset.clone())
    }
}
