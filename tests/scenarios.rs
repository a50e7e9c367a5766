//! End-to-end scenarios S1-S6 from the design notes.

use offset_cache::{Cache, CacheError, Config};

fn cache_with_shards(region_size: u64, shards: u32) -> Cache {
    let config = Config {
        shards: Some(shards),
        ..Config::default()
    };
    Cache::new(region_size, &config).expect("cache init")
}

/// Installs a test-scoped `tracing` subscriber so the `info!`/`debug!` spans
/// `Cache::new`/`close` emit are actually captured under `cargo test --
/// --nocapture` instead of going nowhere. Idempotent across tests in this
/// binary since `try_init` only succeeds once per process.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// S1: basic round-trip.
#[test]
fn s1_basic_round_trip() {
    init_tracing();
    let cache = cache_with_shards(64 * 1024 * 1024, 4);
    cache.set(b"k1", b"v1").unwrap();
    assert_eq!(cache.get(b"k1").unwrap(), b"v1");
    cache.delete(b"k1").unwrap();
    assert!(matches!(cache.get(b"k1"), Err(CacheError::NotFound)));
    assert!(matches!(cache.delete(b"k1"), Err(CacheError::NotFound)));
}

/// S2: in-place overwrite within the same size class.
#[test]
fn s2_in_place_overwrite_same_class() {
    let cache = cache_with_shards(16 * 1024 * 1024, 1);
    cache.set(b"k", b"aaaa").unwrap();
    cache.set(b"k", b"bbbb").unwrap();
    assert_eq!(cache.get(b"k").unwrap(), b"bbbb");
}

/// S3: growing overwrite moves the entry to a larger size class.
#[test]
fn s3_growing_overwrite_to_larger_class() {
    let cache = cache_with_shards(16 * 1024 * 1024, 1);
    cache.set(b"k", b"a").unwrap();
    let big = vec![b'x'; 5000];
    cache.set(b"k", &big).unwrap();
    assert_eq!(cache.get(b"k").unwrap(), big);
}

/// S4: class-local eviction picks the true LRU tail, not a recently-touched key.
#[test]
fn s4_class_local_eviction_picks_lru_tail() {
    let config = Config {
        shards: Some(1),
        max_element_len: Some(4),
        ..Config::default()
    };
    let cache = Cache::new(10 * 1024 * 1024, &config).unwrap();

    let val = vec![b'v'; 10];
    cache.set(b"k1", &val).unwrap();
    cache.set(b"k2", &val).unwrap();
    cache.set(b"k3", &val).unwrap();
    cache.set(b"k4", &val).unwrap();

    cache.get(b"k2").unwrap();

    cache.set(b"k5", &val).unwrap();

    assert!(matches!(cache.get(b"k1"), Err(CacheError::NotFound)), "k1 (true LRU tail) should have been evicted");
    assert_eq!(cache.get(b"k2").unwrap(), val, "k2 was touched and must survive");
    assert_eq!(cache.get(b"k3").unwrap(), val);
    assert_eq!(cache.get(b"k4").unwrap(), val);
    assert_eq!(cache.get(b"k5").unwrap(), val);
}

/// S5: inserting into one size class never evicts a different class's entries.
#[test]
fn s5_cross_class_isolation() {
    let config = Config {
        shards: Some(1),
        max_element_len: Some(8),
        ..Config::default()
    };
    let cache = Cache::new(10 * 1024 * 1024, &config).unwrap();

    let small = vec![b's'; 4];
    cache.set(b"small1", &small).unwrap();
    cache.set(b"small2", &small).unwrap();

    let big = vec![b'b'; 2000];
    for i in 0..7 {
        cache.set(format!("big{i}").as_bytes(), &big).unwrap();
    }

    assert_eq!(cache.get(b"small1").unwrap(), small, "small-class entries must survive a same-capacity big-class insert");
    assert_eq!(cache.get(b"small2").unwrap(), small);
    assert!(
        matches!(cache.get(b"big0"), Err(CacheError::NotFound)),
        "big0 is the big class's own LRU tail and should be evicted instead"
    );
}

/// S6: reattaching with a different shard count is refused.
#[test]
fn s6_config_mismatch_on_reattach() {
    use offset_cache::MemoryType;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("region.bin");

    let config_a = Config {
        memory_type: MemoryType::MmapFile,
        memory_key: Some(path.to_str().unwrap().to_string()),
        shards: Some(4),
        ..Config::default()
    };
    {
        let cache = Cache::new(16 * 1024 * 1024, &config_a).unwrap();
        cache.set(b"k", b"v").unwrap();
    }

    let config_b = Config {
        memory_type: MemoryType::MmapFile,
        memory_key: Some(path.to_str().unwrap().to_string()),
        shards: Some(8),
        ..Config::default()
    };
    let result = Cache::new(16 * 1024 * 1024, &config_b);
    assert!(matches!(result, Err(CacheError::ConfigMismatch)));
}
