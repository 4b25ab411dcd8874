//! HARBOR Core - Shared Types and Collaborator Traits
//!
//! Cache keys, the error taxonomy, configuration, and the traits the asset
//! cache consumes (transport, durable tier, decoder, apply target). All
//! other crates depend on this. No caching logic lives here.

pub mod config;
pub mod error;
pub mod key;
pub mod traits;

pub use config::{
    CacheConfig, DurableConfig, HarborConfig, HttpConfig, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_MEMORY_CAPACITY, MAX_DURABLE_SIZE_MB, MAX_MEMORY_CAPACITY,
};
pub use error::{
    CacheError, ConfigError, DecodeError, HarborError, HarborResult, StorageError, TransportError,
};
pub use key::CacheKey;
pub use traits::{AssetRef, AssetTarget, Decoder, DurableCache, RawBytesDecoder, Transport};

// Re-exported so implementors of the traits don't need their own dependency.
pub use async_trait::async_trait;
pub use bytes::Bytes;
