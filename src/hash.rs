//! Key hashing.
//!
//! Uses `ahash` with fixed seeds rather than `ahash::RandomState::default()`.
//! A per-process random seed would be disastrous here: two processes
//! attaching the same region must compute the same `hash mod shards` for a
//! given key, or a `Set` in one process would land in a shard a `Get` in the
//! other never looks at.
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;

const SEED_0: u64 = 0x243f_6a88_85a3_08d3;
const SEED_1: u64 = 0x1319_8a2e_0370_7344;
const SEED_2: u64 = 0xa409_3822_299f_31d0;
const SEED_3: u64 = 0x082e_fa98_ec4e_6c89;

pub fn hash_bytes(data: &[u8]) -> u64 {
    let state = RandomState::with_seeds(SEED_0, SEED_1, SEED_2, SEED_3);
    let mut hasher = state.build_hasher();
    hasher.write(data);
    hasher.finish()
}
