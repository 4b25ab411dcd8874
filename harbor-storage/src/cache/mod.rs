//! Asset cache: memory tier, durable tier and single-flight fetches.
//!
//! A load walks the tiers from cheapest to most expensive:
//!
//! 1. **Memory** - decoded assets, bounded, FIFO eviction.
//! 2. **Pending** - a pipeline already fetching the key; the caller joins it.
//! 3. **Durable** - raw payloads persisted by a [`DurableCache`](harbor_core::DurableCache).
//! 4. **Network** - the [`Transport`](harbor_core::Transport).
//!
//! Whatever a lower tier returns is decoded once and promoted into the tiers
//! above it. Failures are logged and surface as an absent result.
//!
//! # Example
//!
//! ```ignore
//! let cache = AssetCache::new(config, RawBytesDecoder, transport, Some(durable));
//!
//! // Served from memory after the first call.
//! let sprite = cache.load("https://cdn.example.com/hero.png").await;
//!
//! // Skip cached copies.
//! let fresh = cache
//!     .load_with("https://cdn.example.com/hero.png", LoadPolicy::ForceRefresh)
//!     .await;
//! ```

pub mod asset_cache;
pub mod coordinator;
pub mod in_memory;
pub mod lmdb_backend;
pub mod memory_tier;
pub mod stats;

pub use asset_cache::{AssetCache, LoadPolicy};
pub use coordinator::{FetchCoordinator, FetchOutcome, FlightId, SharedFetch};
pub use in_memory::InMemoryDurableCache;
pub use lmdb_backend::{LmdbCacheError, LmdbDurableCache};
pub use memory_tier::MemoryTier;
pub use stats::CacheStats;
