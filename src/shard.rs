//! A shard: the unit of concurrency. Every public cache operation maps to
//! exactly one shard (picked by `hash(key) % shard_count`) and holds that
//! shard's lock for the operation's entire duration — the hashmap, free
//! store, and LRU store inside a shard are never touched without it.
//!
//! Growth of the global bump allocator happens *inside* a shard operation
//! (via `free_store`'s grow-on-empty), nested inside the shard lock. That's
//! the only place the global lock and a shard lock are ever held at once,
//! and the nesting is always shard-outer, global-inner — a shard operation
//! never reaches into a different shard while holding its own lock, so
//! there's no cycle to deadlock on.

use crate::error::{CacheError, Result};
use crate::free_store::FreeStoreHandle;
use crate::hash::hash_bytes;
use crate::hashmap::HashmapHandle;
use crate::lru_store::LruStoreHandle;
use crate::region::layout::{size_to_index, DataNodeHeader, ElementHeader, ShardHeader, MAX_KEY_LEN, DATA_NODE_HEADER_SIZE, ELEMENT_HEADER_SIZE, NUM_SIZE_CLASSES, class_size};
use crate::region::lock::LockGuard;
use crate::region::Region;

pub struct Shard<'a> {
    region: &'a Region,
    index: u32,
}

impl<'a> Shard<'a> {
    pub fn new(region: &'a Region, index: u32) -> Self {
        Shard { region, index }
    }

    fn header(&self) -> &mut ShardHeader {
        self.region.shard_header_mut(self.index)
    }

    /// Bump-allocate this shard's hashmap/free store/LRU store, the first
    /// time this shard index is ever used in a freshly initialized region.
    /// A no-op (besides the check itself) on a reattached region whose
    /// shards were already set up by whichever process created it.
    pub fn ensure_init(region: &'a Region, index: u32) -> Result<()> {
        let shard = Shard::new(region, index);
        if shard.header().hashmap_offset != 0 {
            return Ok(());
        }
        let max_len = shard.header().max_len;
        let hashmap_offset = HashmapHandle::init(region, max_len)?;
        let lru_offset = crate::allocator::BumpAllocator::new(region).alloc(
            std::mem::size_of::<crate::region::layout::LruStore>() as u64,
            std::mem::align_of::<crate::region::layout::LruStore>() as u64,
        )?;
        LruStoreHandle::init(region, lru_offset);
        let free_offset = FreeStoreHandle::init(region)?;

        let header = shard.header();
        header.hashmap_offset = hashmap_offset;
        header.lru_store_offset = lru_offset;
        header.free_store_offset = free_offset;
        Ok(())
    }

    fn hashmap(&self) -> HashmapHandle<'a> {
        HashmapHandle::at(self.region, self.header().hashmap_offset)
    }

    fn lru(&self) -> LruStoreHandle<'a> {
        LruStoreHandle::at(self.region, self.header().lru_store_offset)
    }

    fn free_store(&self) -> FreeStoreHandle<'a> {
        FreeStoreHandle::at(self.region, self.header().free_store_offset)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let _guard = LockGuard::acquire(&self.header().lock);
        let hash = hash_bytes(key);
        let node_offset = self.hashmap().find(hash, key).ok_or(CacheError::NotFound)?;
        let value = self.read_value(node_offset);
        let index = self.region.resolve::<DataNodeHeader>(node_offset).free_index;
        self.lru().move_to_front(index, node_offset);
        Ok(value)
    }

    pub fn peek(&self, key: &[u8]) -> Result<Vec<u8>> {
        let _guard = LockGuard::acquire(&self.header().lock);
        let hash = hash_bytes(key);
        let node_offset = self.hashmap().find(hash, key).ok_or(CacheError::NotFound)?;
        Ok(self.read_value(node_offset))
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _guard = LockGuard::acquire(&self.header().lock);
        let hash = hash_bytes(key);
        let node_offset = self.hashmap().remove(hash, key).ok_or(CacheError::NotFound)?;
        self.evict_node(node_offset);
        Ok(())
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > MAX_KEY_LEN {
            return Err(CacheError::KeyTooLarge {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }
        let needed = ELEMENT_HEADER_SIZE + key.len() as u64 + value.len() as u64;
        let index = size_to_index(needed).ok_or(CacheError::ValueTooLarge { index: 0 })?;
        if index as usize >= NUM_SIZE_CLASSES {
            return Err(CacheError::ValueTooLarge { index: index as u32 });
        }

        let _guard = LockGuard::acquire(&self.header().lock);
        let hash = hash_bytes(key);

        if let Some(existing_offset) = self.hashmap().find(hash, key) {
            let existing_index = self.region.resolve::<DataNodeHeader>(existing_offset).free_index;
            if existing_index == index {
                self.write_element(existing_offset, key, value);
                self.lru().move_to_front(index, existing_offset);
                return Ok(());
            }
            // Growing or shrinking into a different class: drop the old
            // node entirely and fall through to a fresh insert below.
            self.hashmap().remove(hash, key);
            self.evict_node(existing_offset);
        }

        if self.header().len >= self.header().max_len {
            self.evict_one(index);
        }

        let node_offset = self.free_store().alloc(index)?;
        self.write_element(node_offset, key, value);
        self.hashmap().insert(hash, node_offset);
        self.lru().push_front(index, node_offset);
        self.header().len += 1;
        Ok(())
    }

    /// Evict the size class `index`'s true LRU tail, if it has one. A class
    /// with no entries yet has nothing to give back — admission still lets
    /// the incoming write through by growing the free store instead, since
    /// eviction here is scoped strictly to the incoming write's own class.
    fn evict_one(&self, index: u8) {
        let Some(tail_offset) = self.lru().back(index) else {
            return;
        };
        let elem = self
            .region
            .resolve::<ElementHeader>(tail_offset + DATA_NODE_HEADER_SIZE);
        let key_len = elem.key_len;
        let key_offset = tail_offset + DATA_NODE_HEADER_SIZE + ELEMENT_HEADER_SIZE;
        let key = self.region.bytes_mut(key_offset, key_len as u64).to_vec();
        let hash = hash_bytes(&key);
        if self.hashmap().remove(hash, &key).is_some() {
            self.evict_node(tail_offset);
        }
    }

    /// Remove a node (already unlinked from the hashmap) from its LRU list
    /// and return it to its free list.
    fn evict_node(&self, node_offset: u64) {
        let index = self.region.resolve::<DataNodeHeader>(node_offset).free_index;
        self.lru().remove(index, node_offset);
        self.free_store().free(index, node_offset);
        self.header().len -= 1;
    }

    fn read_value(&self, node_offset: u64) -> Vec<u8> {
        let elem = self
            .region
            .resolve::<ElementHeader>(node_offset + DATA_NODE_HEADER_SIZE);
        let val_offset = node_offset + DATA_NODE_HEADER_SIZE + ELEMENT_HEADER_SIZE + elem.key_len as u64;
        self.region.bytes_mut(val_offset, elem.val_len as u64).to_vec()
    }

    fn write_element(&self, node_offset: u64, key: &[u8], value: &[u8]) {
        let index = self.region.resolve::<DataNodeHeader>(node_offset).free_index;
        debug_assert!(
            ELEMENT_HEADER_SIZE + key.len() as u64 + value.len() as u64 <= class_size(index),
            "element does not fit in its assigned size class"
        );
        let elem = self
            .region
            .resolve_mut::<ElementHeader>(node_offset + DATA_NODE_HEADER_SIZE);
        elem.key_len = key.len() as u32;
        elem.val_len = value.len() as u32;
        let key_offset = node_offset + DATA_NODE_HEADER_SIZE + ELEMENT_HEADER_SIZE;
        self.region.bytes_mut(key_offset, key.len() as u64).copy_from_slice(key);
        let val_offset = key_offset + key.len() as u64;
        self.region.bytes_mut(val_offset, value.len() as u64).copy_from_slice(value);
    }

    pub fn len(&self) -> u64 {
        self.header().len
    }
}
