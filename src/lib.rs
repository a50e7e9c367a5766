//! A self-describing, offset-addressed key/value cache for shared memory.
//!
//! Every structure in the backing region is reached as `base + offset`
//! (never a raw pointer), so any number of processes attaching the same
//! region see an identical structure regardless of where the region happens
//! to be mapped in each process's address space. Concurrency within the
//! region is mediated by spinlocks resident in the region itself, not by
//! anything process-local.
//!
//! ```no_run
//! use offset_cache::{Cache, Config};
//!
//! let cache = Cache::new(64 * 1024 * 1024, &Config::default())?;
//! cache.set(b"hello", b"world")?;
//! assert_eq!(cache.get(b"hello")?, b"world");
//! # Ok::<(), offset_cache::CacheError>(())
//! ```

mod allocator;
mod cache;
mod config;
mod error;
mod free_store;
mod hash;
mod hashmap;
mod lru_store;
mod region;
mod shard;

pub use cache::Cache;
pub use config::{Config, MemoryType, MIN_REGION_SIZE};
pub use error::{CacheError, Result};
