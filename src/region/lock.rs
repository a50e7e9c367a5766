//! The cross-process spinlock.
//!
//! A single atomic word resident inside the region, so it works identically
//! whether the two contending threads are in the same process or in two
//! processes that both mmap'd the same file. A plain `Mutex` can't be used
//! here — it isn't guaranteed to operate correctly on memory it didn't
//! allocate itself.
//!
//! One lock type serves both the global (region-growth) lock and every
//! per-shard lock; the design uses exclusive locking only (a prior
//! reader/writer variant was abandoned — see `shard.rs`).

use std::sync::atomic::{AtomicI32, Ordering};

const UNLOCKED: i32 = 0;
const LOCKED: i32 = 1;

/// `#[repr(C)]` so its layout is stable across compilations and processes.
#[repr(C)]
pub struct SpinLock {
    word: AtomicI32,
}

impl SpinLock {
    pub const fn new() -> Self {
        SpinLock {
            word: AtomicI32::new(UNLOCKED),
        }
    }

    pub fn lock(&self) {
        loop {
            if self
                .word
                .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    pub fn unlock(&self) {
        let prev = self.word.swap(UNLOCKED, Ordering::Release);
        assert_eq!(prev, LOCKED, "unlock of a lock that was not held");
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by nothing in particular — callers call
/// [`SpinLock::lock`]/[`SpinLock::unlock`] explicitly because the lock lives
/// behind a raw pointer into the region, not behind a Rust reference with a
/// lifetime we could tie a guard to.
pub struct LockGuard<'a> {
    lock: &'a SpinLock,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(lock: &'a SpinLock) -> Self {
        lock.lock();
        LockGuard { lock }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
