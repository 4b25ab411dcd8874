//! End-to-end loading scenarios across the memory, durable and network tiers.

use std::sync::Arc;
use std::time::Duration;

use harbor_core::{Bytes, CacheConfig, CacheKey, DurableCache, RawBytesDecoder, Transport};
use harbor_storage::{AssetCache, InMemoryDurableCache, LmdbDurableCache, LoadPolicy};
use harbor_test_utils::assertions::assert_same_asset;
use harbor_test_utils::fixtures::{config_with_capacity, sample_payload, sample_url, transport_for};
use harbor_test_utils::{
    FetchGate, MockDurableCache, MockTransport, RecordingTarget, Utf8Decoder,
};
use tempfile::TempDir;

// ============================================================================
// HELPERS
// ============================================================================

fn with_durable<D: harbor_core::Decoder>(
    config: CacheConfig,
    decoder: D,
    transport: &Arc<MockTransport>,
    durable: &Arc<MockDurableCache>,
) -> AssetCache<D> {
    AssetCache::new(
        config,
        decoder,
        Arc::clone(transport) as Arc<dyn Transport>,
        Some(Arc::clone(durable) as Arc<dyn DurableCache>),
    )
}

fn key(s: &str) -> CacheKey {
    CacheKey::new(s).expect("non-empty key")
}

// ============================================================================
// CAPACITY AND EVICTION
// ============================================================================

#[tokio::test]
async fn test_capacity_two_evicts_first_inserted() {
    let transport = Arc::new(transport_for(3));
    let cache = AssetCache::memory_only(
        config_with_capacity(2),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    for i in 0..3 {
        cache.load(&sample_url(i)).await.expect("loaded");
    }

    assert_eq!(cache.memory_len(), 2);
    assert!(!cache.is_cached(&sample_url(0)));
    assert!(cache.is_cached(&sample_url(1)));
    assert!(cache.is_cached(&sample_url(2)));
    assert_eq!(cache.stats().evictions, 1);

    // The evicted entry needs the network again.
    cache.load(&sample_url(0)).await.expect("reloaded");
    assert_eq!(transport.calls(&sample_url(0)), 2);
}

#[tokio::test]
async fn test_durable_hit_with_unreachable_transport() {
    let transport = Arc::new(MockTransport::new());
    let durable = Arc::new(MockDurableCache::new());
    let url = sample_url(1);
    durable.seed(&url, sample_payload(&url));

    let cache = with_durable(config_with_capacity(2), RawBytesDecoder, &transport, &durable);
    let asset = cache.load(&url).await.expect("served from disk");

    assert_eq!(*asset, sample_payload(&url));
    assert_eq!(transport.total_calls(), 0);
    assert_eq!(cache.memory_len(), 1);
}

// ============================================================================
// TIER ORDER AND POPULATION
// ============================================================================

#[tokio::test]
async fn test_network_result_populates_both_tiers() {
    let temp_dir = TempDir::new().expect("TempDir creation should succeed");
    let lmdb = Arc::new(LmdbDurableCache::new(temp_dir.path(), 10).expect("lmdb"));
    let transport = Arc::new(transport_for(1));
    let url = sample_url(0);

    let cache = AssetCache::new(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Some(Arc::clone(&lmdb) as Arc<dyn DurableCache>),
    );

    let first = cache.load(&url).await.expect("network");
    cache.flush_durable_writes().await;

    let stored = lmdb.get(&key(&url)).await.expect("read").expect("persisted");
    assert_eq!(stored, sample_payload(&url));

    let second = cache.load(&url).await.expect("memory");
    assert_same_asset(&first, &second);
    assert_eq!(transport.calls(&url), 1);
}

#[tokio::test]
async fn test_undecodable_durable_payload_falls_through_to_network() {
    let url = sample_url(0);
    let transport = Arc::new(
        MockTransport::new().with_response(url.clone(), Bytes::from_static(b"fresh")),
    );
    let durable = Arc::new(MockDurableCache::new());
    durable.seed(&url, Bytes::from_static(&[0xff, 0xfe, 0xfd]));

    let cache = with_durable(CacheConfig::default(), Utf8Decoder::new(), &transport, &durable);
    let asset = cache.load(&url).await.expect("network copy");
    cache.flush_durable_writes().await;

    assert_eq!(asset.as_str(), "fresh");
    assert_eq!(transport.calls(&url), 1);
    assert_eq!(durable.payload(&url), Some(Bytes::from_static(b"fresh")));
}

#[tokio::test]
async fn test_empty_durable_payload_is_a_miss() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1));
    let durable = Arc::new(MockDurableCache::new());
    durable.seed(&url, Bytes::new());

    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);
    assert!(!cache.is_cached(&url));
    cache.load(&url).await.expect("network copy");
    assert_eq!(transport.calls(&url), 1);
}

#[tokio::test]
async fn test_durable_read_error_falls_through_to_network() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1));
    let durable = Arc::new(MockDurableCache::new());
    durable.seed(&url, Bytes::from_static(b"stale"));
    durable.fail_reads(true);

    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);
    let asset = cache.load(&url).await.expect("network copy");

    assert_eq!(*asset, sample_payload(&url));
    assert_eq!(durable.gets(), 1);
}

#[tokio::test]
async fn test_force_refresh_skips_durable_tier() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1));
    let durable = Arc::new(MockDurableCache::new());
    durable.seed(&url, Bytes::from_static(b"old"));

    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);
    let asset = cache
        .load_with(&url, LoadPolicy::ForceRefresh)
        .await
        .expect("network copy");
    cache.flush_durable_writes().await;

    assert_eq!(*asset, sample_payload(&url));
    assert_eq!(durable.gets(), 0);
    assert_eq!(durable.payload(&url), Some(sample_payload(&url)));
}

// ============================================================================
// CACHE-ONLY READS AND WRITES
// ============================================================================

#[tokio::test]
async fn test_get_from_cache_never_fetches() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1));
    let durable = Arc::new(MockDurableCache::new());
    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);

    assert!(cache.get_from_cache(&url).await.is_none());
    assert_eq!(transport.total_calls(), 0);

    durable.seed(&url, Bytes::from_static(b"disk"));
    assert!(cache.is_cached(&url));
    let promoted = cache.get_from_cache(&url).await.expect("durable hit");
    assert_eq!(cache.memory_len(), 1);

    let again = cache.get_from_cache(&url).await.expect("memory hit");
    assert_same_asset(&promoted, &again);
    assert_eq!(durable.gets(), 2);
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_save_to_cache_writes_through() {
    let url = sample_url(0);
    let transport = Arc::new(MockTransport::new());
    let durable = Arc::new(MockDurableCache::new());
    let cache = with_durable(CacheConfig::default(), Utf8Decoder::new(), &transport, &durable);

    cache.save_to_cache(&url, "generated".to_string());
    assert!(cache.is_cached(&url));
    let asset = cache.load(&url).await.expect("memory");
    assert_eq!(asset.as_str(), "generated");

    cache.flush_durable_writes().await;
    assert_eq!(durable.payload(&url), Some(Bytes::from_static(b"generated")));
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_save_without_encoder_stays_in_memory() {
    let url = sample_url(0);
    let transport = Arc::new(MockTransport::new());
    let durable = Arc::new(MockDurableCache::new());
    let cache = with_durable(
        CacheConfig::default(),
        Utf8Decoder::without_encode(),
        &transport,
        &durable,
    );

    cache.save_to_cache(&url, "generated".to_string());
    cache.flush_durable_writes().await;

    assert!(cache.is_cached(&url));
    assert_eq!(durable.puts(), 0);
}

#[tokio::test]
async fn test_save_replaces_existing_entry() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1));
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    cache.load(&url).await.expect("network");
    cache.save_to_cache(&url, Bytes::from_static(b"override"));

    let asset = cache.load(&url).await.expect("memory");
    assert_eq!(&asset[..], b"override");
    assert_eq!(cache.memory_len(), 1);
}

// ============================================================================
// CLEARING
// ============================================================================

#[tokio::test]
async fn test_clear_cache_empties_both_tiers() {
    let transport = Arc::new(transport_for(2));
    let durable = Arc::new(InMemoryDurableCache::new());
    let cache = AssetCache::new(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Some(Arc::clone(&durable) as Arc<dyn DurableCache>),
    );

    for i in 0..2 {
        cache.load(&sample_url(i)).await.expect("loaded");
    }
    cache.flush_durable_writes().await;
    assert_eq!(durable.len(), 2);

    cache.clear_cache().await;
    assert_eq!(cache.memory_len(), 0);
    assert!(durable.is_empty());

    cache.load(&sample_url(0)).await.expect("refetched");
    assert_eq!(transport.calls(&sample_url(0)), 2);
}

#[tokio::test]
async fn test_clear_key_leaves_other_entries() {
    let transport = Arc::new(transport_for(2));
    let durable = Arc::new(MockDurableCache::new());
    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);

    for i in 0..2 {
        cache.load(&sample_url(i)).await.expect("loaded");
    }
    cache.flush_durable_writes().await;

    cache.clear_key(&sample_url(0)).await;
    assert!(!cache.is_cached(&sample_url(0)));
    assert!(cache.is_cached(&sample_url(1)));
    assert!(!durable.contains(&sample_url(0)));
    assert_eq!(durable.removes(), 1);
}

// ============================================================================
// KEYS, FAILURES AND TARGETS
// ============================================================================

#[tokio::test]
async fn test_keys_are_compared_exactly() {
    let transport = Arc::new(
        MockTransport::new()
            .with_response("http://a/x", Bytes::from_static(b"plain"))
            .with_response("http://a/x/", Bytes::from_static(b"slash"))
            .with_response("HTTP://a/x", Bytes::from_static(b"upper")),
    );
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    for url in ["http://a/x", "http://a/x/", "HTTP://a/x"] {
        cache.load(url).await.expect("loaded");
    }

    assert_eq!(cache.memory_len(), 3);
    assert_eq!(transport.total_calls(), 3);
    let slash = cache.get_from_cache("http://a/x/").await.expect("cached");
    assert_eq!(&slash[..], b"slash");
}

#[tokio::test]
async fn test_joined_callers_all_see_failure() {
    let url = sample_url(0);
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(50)));
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    let loads = futures_util::future::join_all((0..5).map(|_| cache.load(&url))).await;

    assert!(loads.iter().all(Option::is_none));
    assert_eq!(transport.calls(&url), 1);
    assert_eq!(cache.pending_len(), 0);
    assert_eq!(cache.memory_len(), 0);
}

#[tokio::test]
async fn test_load_into_with_empty_key_applies_placeholder_only() {
    let transport = Arc::new(MockTransport::new());
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );
    let target = Arc::new(RecordingTarget::<Bytes>::new());

    let task = cache.load_into(
        "",
        &target,
        Some(Arc::new(Bytes::from_static(b"placeholder"))),
        LoadPolicy::PreferCache,
    );

    assert!(task.is_none());
    assert_eq!(target.applied().len(), 1);
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_load_into_dropped_target_receives_nothing() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1).with_delay(Duration::from_millis(20)));
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );
    let target = Arc::new(RecordingTarget::<Bytes>::new());
    let observer = Arc::downgrade(&target);

    let task = cache
        .load_into(&url, &target, None, LoadPolicy::PreferCache)
        .expect("task");
    drop(target);
    task.await.expect("task");

    assert!(observer.upgrade().is_none());
    assert!(cache.is_cached(&url));
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_across_worker_threads() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1).with_delay(Duration::from_millis(50)));
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            let url = url.clone();
            tokio::spawn(async move { cache.load(&url).await })
        })
        .collect();

    let mut assets = Vec::new();
    for task in tasks {
        assets.push(task.await.expect("task").expect("asset"));
    }

    assert_eq!(transport.calls(&url), 1);
    for asset in &assets[1..] {
        assert_same_asset(&assets[0], asset);
    }
    assert_eq!(cache.pending_len(), 0);
}

#[tokio::test]
async fn test_concurrent_loads_read_durable_tier_once() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1).with_delay(Duration::from_millis(20)));
    let durable = Arc::new(MockDurableCache::new());
    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);

    let loads = futures_util::future::join_all((0..10).map(|_| cache.load(&url))).await;
    let assets: Vec<_> = loads.into_iter().flatten().collect();
    cache.flush_durable_writes().await;

    assert_eq!(assets.len(), 10);
    assert_eq!(durable.gets(), 1);
    assert_eq!(transport.calls(&url), 1);
    assert_eq!(durable.puts(), 1);
    for asset in &assets[1..] {
        assert_same_asset(&assets[0], asset);
    }
}

#[tokio::test]
async fn test_force_refresh_joins_running_fetch() {
    let url = sample_url(0);
    let gate = FetchGate::closed();
    let transport = Arc::new(transport_for(1).with_gate(gate.clone()));
    let cache = AssetCache::memory_only(
        CacheConfig::default(),
        RawBytesDecoder,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    let plain = {
        let cache = cache.clone();
        let url = url.clone();
        tokio::spawn(async move { cache.load(&url).await })
    };
    while !cache.is_fetching(&url) {
        tokio::task::yield_now().await;
    }

    let forced = {
        let cache = cache.clone();
        let url = url.clone();
        tokio::spawn(async move { cache.load_with(&url, LoadPolicy::ForceRefresh).await })
    };
    while cache.stats().joined_loads == 0 {
        tokio::task::yield_now().await;
    }
    gate.open_all();

    let plain = plain.await.expect("task").expect("asset");
    let forced = forced.await.expect("task").expect("asset");

    assert_eq!(transport.calls(&url), 1);
    assert_eq!(cache.stats().joined_loads, 1);
    assert_same_asset(&plain, &forced);
}

#[tokio::test]
async fn test_dispose_makes_cache_inert() {
    let url = sample_url(0);
    let transport = Arc::new(transport_for(1));
    let durable = Arc::new(MockDurableCache::new());
    let cache = with_durable(CacheConfig::default(), RawBytesDecoder, &transport, &durable);
    cache.load(&url).await.expect("loaded");
    cache.flush_durable_writes().await;

    cache.dispose();
    assert_eq!(cache.memory_len(), 0);
    assert!(!cache.is_cached(&url));
    assert!(cache.load(&url).await.is_none());
    assert!(cache.get_from_cache(&url).await.is_none());

    cache.save_to_cache(&url, Bytes::from_static(b"ignored"));
    cache.flush_durable_writes().await;
    assert_eq!(cache.memory_len(), 0);
    assert_eq!(durable.puts(), 1);
    assert_eq!(transport.calls(&url), 1);

    cache.clear_key(&url).await;
    cache.clear_cache().await;
    assert_eq!(durable.removes(), 0);
    assert_eq!(durable.clears(), 0);
    assert!(durable.contains(&url));
}
