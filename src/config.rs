//! Cache configuration and the digest stored in the region header.
//!
//! Mirrors the original's `Config`/`mergeConfig`/`getConfigHash` trio: the
//! caller supplies a sparse `Config`, we fold in defaults sized off the
//! region, and hash the effective result so a reattaching process can tell
//! whether it's looking at the same layout.

use serde::Serialize;

use crate::error::{CacheError, Result};
use crate::hash::hash_bytes;

/// Minimum region size accepted by [`crate::Cache::new`].
pub const MIN_REGION_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryType {
    /// Process-local heap allocation. Does not survive the process.
    Heap,
    /// System V shared memory segment, identified by `memory_key`.
    PosixShm,
    /// Memory-mapped file at the path given by `memory_key`.
    MmapFile,
}

/// User-supplied, possibly-sparse configuration.
///
/// Unset fields (`shards = None`, `max_element_len = None`) are filled in by
/// [`EffectiveConfig::resolve`] using the same defaults as the original:
/// `shards` defaults to `4 * logical CPUs`, `max_element_len` to
/// `region_size / 512`.
#[derive(Debug, Clone)]
pub struct Config {
    pub memory_type: MemoryType,
    pub memory_key: Option<String>,
    pub shards: Option<u32>,
    pub max_element_len: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memory_type: MemoryType::Heap,
            memory_key: None,
            shards: None,
            max_element_len: None,
        }
    }
}

/// Config with every field resolved to a concrete value, ready to be hashed
/// and stamped into the region header.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub memory_type: MemoryType,
    #[serde(skip)]
    pub memory_key: Option<String>,
    pub shards: u32,
    pub max_element_len: u64,
    pub region_size: u64,
}

impl EffectiveConfig {
    pub fn resolve(region_size: u64, config: &Config) -> Result<Self> {
        let shards = config.shards.unwrap_or_else(|| num_cpus::get() as u32 * 4).max(1);
        let max_element_len = config
            .max_element_len
            .unwrap_or_else(|| (region_size / 512).max(shards as u64));

        if !matches!(config.memory_type, MemoryType::Heap) && config.memory_key.is_none() {
            return Err(CacheError::MissingMemoryKey(config.memory_type));
        }

        Ok(EffectiveConfig {
            memory_type: config.memory_type,
            memory_key: config.memory_key.clone(),
            shards,
            max_element_len,
            region_size,
        })
    }

    /// Per-shard admission cap: `ceil(max_element_len / shards)`.
    pub fn per_shard_max_len(&self) -> u64 {
        self.max_element_len.div_ceil(self.shards as u64)
    }

    /// Digest of the fields that must match on reattach. Serialized with
    /// `serde_json` the same way the original hashes its `Config` via
    /// `encoding/json`, then run through the same hasher used for keys.
    pub fn digest(&self) -> u64 {
        let bytes = serde_json::to_vec(self).expect("EffectiveConfig serializes infallibly");
        hash_bytes(&bytes)
    }
}
