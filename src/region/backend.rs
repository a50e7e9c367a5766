//! Memory backends: "give me a stable pointer to N bytes, identified by a
//! key." Heap, POSIX shared memory, and mmap'd file, matching the three
//! `MemoryType` variants in the config.
//!
//! None of these backends know anything about the region layout above
//! them — they hand back a raw, zeroed, page-stable buffer and nothing else.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::MmapMut;

use crate::config::{Config, MemoryType};
use crate::error::Result;

/// A stable backing store for the region. `as_ptr`/`len` must remain valid
/// and constant for the lifetime of the backend.
pub trait Backend: Send + Sync {
    fn as_ptr(&self) -> *mut u8;
    fn len(&self) -> usize;
}

/// Process-local heap allocation. 64-byte aligned so the region header and
/// every size class sit on a cache-line boundary.
pub struct HeapBackend {
    ptr: *mut u8,
    len: usize,
    layout: Layout,
}

const HEAP_ALIGN: usize = 64;

impl HeapBackend {
    pub fn new(len: usize) -> Result<Self> {
        let layout = Layout::from_size_align(len, HEAP_ALIGN).expect("valid heap region layout");
        // SAFETY: layout has non-zero size, checked by the caller via MIN_REGION_SIZE.
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "heap region allocation failed").into());
        }
        Ok(HeapBackend { ptr, len, layout })
    }
}

impl Backend for HeapBackend {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for HeapBackend {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`layout` are exactly what we allocated with above.
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

// SAFETY: the buffer is only ever handed out through `Region`, which
// synchronizes all access with the in-region spinlocks.
unsafe impl Send for HeapBackend {}
unsafe impl Sync for HeapBackend {}

/// A System V shared memory segment, attached by a crc32 hash of the key
/// the caller provides (same trick the original uses to turn an arbitrary
/// string into a `key_t`).
pub struct PosixShmBackend {
    ptr: *mut u8,
    len: usize,
    shmid: i32,
}

impl PosixShmBackend {
    pub fn new(key: &str, len: usize) -> Result<Self> {
        let shm_key = shm_key_from_str(key);
        // SAFETY: standard shmget/shmat sequence; we check every return value.
        unsafe {
            let shmid = libc::shmget(
                shm_key,
                len,
                libc::IPC_CREAT | 0o600,
            );
            if shmid < 0 {
                return Err(io::Error::last_os_error().into());
            }
            let raw = libc::shmat(shmid, std::ptr::null(), 0);
            if raw as isize == -1 {
                return Err(io::Error::last_os_error().into());
            }
            Ok(PosixShmBackend {
                ptr: raw as *mut u8,
                len,
                shmid,
            })
        }
    }
}

impl Backend for PosixShmBackend {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for PosixShmBackend {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from the matching `shmat` call above.
        unsafe {
            libc::shmdt(self.ptr as *const libc::c_void);
        }
    }
}

unsafe impl Send for PosixShmBackend {}
unsafe impl Sync for PosixShmBackend {}

fn shm_key_from_str(s: &str) -> i32 {
    let mut crc: u32 = 0xffff_ffff;
    for &b in s.as_bytes() {
        crc ^= b as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    (!crc) as i32
}

/// A memory-mapped file. Durable across process restarts as long as the
/// file survives — the region header's `magic`/`config_hash` are what let a
/// reattaching process decide whether to trust what's on disk.
pub struct MmapFileBackend {
    mmap: MmapMut,
}

impl MmapFileBackend {
    pub fn new(path: &Path, len: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let existing_len = file.metadata()?.len();
        if existing_len < len as u64 {
            file.set_len(len as u64)?;
        }
        // SAFETY: the file is exclusively ours to map for the region's lifetime.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(MmapFileBackend { mmap })
    }
}

impl Backend for MmapFileBackend {
    fn as_ptr(&self) -> *mut u8 {
        self.mmap.as_ptr() as *mut u8
    }

    fn len(&self) -> usize {
        self.mmap.len()
    }
}

/// Build the backend named by `config.memory_type`, sized to `len` bytes.
pub fn open(config: &Config, len: usize) -> Result<Box<dyn Backend>> {
    match config.memory_type {
        MemoryType::Heap => Ok(Box::new(HeapBackend::new(len)?)),
        MemoryType::PosixShm => {
            let key = config
                .memory_key
                .as_deref()
                .ok_or(crate::error::CacheError::MissingMemoryKey(MemoryType::PosixShm))?;
            Ok(Box::new(PosixShmBackend::new(key, len)?))
        }
        MemoryType::MmapFile => {
            let key = config
                .memory_key
                .as_deref()
                .ok_or(crate::error::CacheError::MissingMemoryKey(MemoryType::MmapFile))?;
            Ok(Box::new(MmapFileBackend::new(Path::new(key), len)?))
        }
    }
}
