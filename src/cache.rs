//! The public cache façade: picks a shard for a key and dispatches to it,
//! plus the graceful-close machinery shared by every operation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::hash::hash_bytes;
use crate::region::Region;
use crate::shard::Shard;

/// Bounded retries `close` spends waiting for in-flight operations to
/// drain before giving up with [`CacheError::CloseTimeout`].
const CLOSE_RETRIES: u32 = 200;
const CLOSE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(5);

/// A self-describing, offset-addressed key/value cache.
///
/// `Cache` is `Send + Sync` and cheap to clone the handle for (it's a thin
/// wrapper around the region); every operation is safe to call from any
/// number of threads, and from any number of processes attached to the same
/// backing memory.
pub struct Cache {
    region: Region,
    closed: AtomicBool,
    in_flight: AtomicU64,
}

impl Cache {
    /// Create (or attach to) a cache backed by a region of `region_size`
    /// bytes, configured by `config`. On a fresh region this initializes
    /// every shard's hashmap/free store/LRU store; on an existing region it
    /// verifies the stored config digest matches `config` and refuses to
    /// attach otherwise.
    pub fn new(region_size: u64, config: &Config) -> Result<Self> {
        let region = Region::create_or_open(region_size, config)?;
        let shard_count = region.header().shard_count;
        info!(shard_count, region_size, "initializing cache region");
        for i in 0..shard_count {
            Shard::ensure_init(&region, i)?;
        }
        Ok(Cache {
            region,
            closed: AtomicBool::new(false),
            in_flight: AtomicU64::new(0),
        })
    }

    fn shard_for(&self, key: &[u8]) -> Shard<'_> {
        let hash = hash_bytes(key);
        let index = (hash % self.region.header().shard_count as u64) as u32;
        Shard::new(&self.region, index)
    }

    /// Runs `f` against the key's shard, bracketed by the closed-check and
    /// in-flight accounting every public operation shares.
    fn dispatch<T>(&self, key: &[u8], f: impl FnOnce(&Shard<'_>) -> Result<T>) -> Result<T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::CacheClosed);
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = f(&self.shard_for(key));
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        result
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.dispatch(key, |shard| shard.get(key))
    }

    pub fn peek(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.dispatch(key, |shard| shard.peek(key))
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.dispatch(key, |shard| shard.set(key, value))
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.dispatch(key, |shard| shard.delete(key))
    }

    /// Marks the cache closed and waits for in-flight operations to drain.
    /// Once this returns `Ok`, every subsequent call returns
    /// [`CacheError::CacheClosed`] without taking any shard lock. Returns
    /// [`CacheError::CloseTimeout`] if operations are still in flight after
    /// a bounded number of retries — `close` never blocks forever.
    pub fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        for attempt in 0..CLOSE_RETRIES {
            if self.in_flight.load(Ordering::Acquire) == 0 {
                debug!(attempt, "cache drained");
                return Ok(());
            }
            std::thread::sleep(CLOSE_RETRY_DELAY);
        }
        Err(CacheError::CloseTimeout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn shard_count(&self) -> u32 {
        self.region.header().shard_count
    }
}
