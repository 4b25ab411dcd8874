//! HARBOR CLI - cache warm and clear driver behind `harbor-fetch`.

pub mod args;
pub mod error;

use std::sync::Arc;

use futures_util::future::join_all;
use harbor_core::{DurableCache, HarborConfig, RawBytesDecoder, Transport};
use harbor_http::HttpTransport;
use harbor_storage::{AssetCache, CacheStats, LmdbDurableCache, LoadPolicy};

pub use args::CliArgs;
pub use error::CliError;

/// Outcome of one URL: payload size on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub url: String,
    pub bytes: Option<usize>,
}

impl std::fmt::Display for FetchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bytes {
            Some(bytes) => write!(f, "{}\t{}", self.url, bytes),
            None => write!(f, "{}\tMISS", self.url),
        }
    }
}

/// Build the cache described by `config`, with the HTTP transport.
pub fn build_cache(config: &HarborConfig) -> Result<AssetCache<RawBytesDecoder>, CliError> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.http)?);
    build_cache_with(config, transport)
}

/// Build the cache described by `config` over a caller-supplied transport.
pub fn build_cache_with(
    config: &HarborConfig,
    transport: Arc<dyn Transport>,
) -> Result<AssetCache<RawBytesDecoder>, CliError> {
    let durable = match &config.durable {
        Some(durable) => {
            let lmdb = LmdbDurableCache::new(&durable.path, durable.max_size_mb)?;
            Some(Arc::new(lmdb) as Arc<dyn DurableCache>)
        }
        None => None,
    };
    Ok(AssetCache::new(
        config.cache.clone(),
        RawBytesDecoder,
        transport,
        durable,
    ))
}

/// Load every URL concurrently and report each outcome in input order.
pub async fn fetch_all(
    cache: &AssetCache<RawBytesDecoder>,
    urls: &[String],
    policy: LoadPolicy,
) -> Vec<FetchReport> {
    let loads = urls.iter().map(|url| async move {
        let asset = cache.load_with(url, policy).await;
        FetchReport {
            url: url.clone(),
            bytes: asset.map(|bytes| bytes.len()),
        }
    });
    join_all(loads).await
}

/// Run one invocation: optional clear, loads, then wait for durable writes.
pub async fn run(
    cache: &AssetCache<RawBytesDecoder>,
    args: &CliArgs,
) -> (Vec<FetchReport>, CacheStats) {
    if args.clear {
        cache.clear_cache().await;
        tracing::info!("Cleared memory and durable caches");
    }

    let policy = if args.refresh {
        LoadPolicy::ForceRefresh
    } else {
        LoadPolicy::PreferCache
    };
    let reports = fetch_all(cache, &args.urls, policy).await;
    cache.flush_durable_writes().await;
    (reports, cache.stats())
}

pub fn format_stats(stats: &CacheStats) -> String {
    format!(
        "memory_hits={} durable_hits={} network_fetches={} joined={} failures={} evictions={} entries={} hit_rate={:.2}",
        stats.memory_hits,
        stats.durable_hits,
        stats.network_fetches,
        stats.joined_loads,
        stats.failures,
        stats.evictions,
        stats.entry_count,
        stats.hit_rate(),
    )
}
