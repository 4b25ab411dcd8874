//! HARBOR Storage - Tiered Asset Cache
//!
//! The cache orchestrator, its bounded memory tier, the single-flight fetch
//! registry and the bundled durable tiers (LMDB on disk, or in-process).
//! Network access and payload decoding are supplied by the host through the
//! traits in `harbor-core`.

pub mod cache;

pub use cache::{
    AssetCache, CacheStats, FetchCoordinator, InMemoryDurableCache, LmdbCacheError,
    LmdbDurableCache, LoadPolicy, MemoryTier,
};
