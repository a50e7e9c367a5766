//! Public error type for the cache.
//!
//! `FreeListEmpty` / `LRUListEmpty` from the design notes never escape this
//! type — they're recovered internally by growth or within-class eviction
//! before a public operation returns.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("memory size too small: region must be at least {min} bytes, got {got}")]
    MemorySizeTooSmall { min: u64, got: u64 },

    #[error("no space: size class {index} has no free node and nothing evictable")]
    NoSpace { index: u8 },

    #[error("key not found")]
    NotFound,

    #[error("key too large: {len} bytes exceeds the {max} byte limit")]
    KeyTooLarge { len: usize, max: usize },

    #[error("value too large: element needs size class {index}, max is 24")]
    ValueTooLarge { index: u32 },

    #[error("size class index {0} is out of range (max 24)")]
    IndexOutOfRange(u32),

    #[error("cache is closed")]
    CacheClosed,

    #[error("close timed out waiting for in-flight operations to drain")]
    CloseTimeout,

    #[error(
        "region config mismatch: an existing region was initialized with a different \
         configuration; wipe the backing storage before reattaching"
    )]
    ConfigMismatch,

    #[error("bad magic: backing storage is not an initialized region")]
    BadMagic,

    #[error("backend I/O error")]
    Backend(#[from] std::io::Error),

    #[error("memory_key is required for memory_type {0:?}")]
    MissingMemoryKey(crate::config::MemoryType),
}

pub type Result<T> = std::result::Result<T, CacheError>;
