//! Per-shard, per-size-class free lists.
//!
//! Each shard owns one [`FreeStore`](crate::region::layout::FreeStore): 25
//! singly-linked lists of [`DataNodeHeader`](crate::region::layout::DataNodeHeader)
//! nodes, one list per power-of-two size class. `Shard::set` pulls a node
//! from the list matching the incoming value's class; if the list is empty
//! it grows by bump-allocating a new batch of same-size nodes from the
//! global allocator, mirroring the original's `freeList.grow`.

use crate::allocator::BumpAllocator;
use crate::error::{CacheError, Result};
use crate::region::layout::{
    class_size, node_stride, FreeList, FreeStore, DATA_NODE_HEADER_SIZE, NUM_SIZE_CLASSES,
    PAGE_SIZE, PREWARM_COUNT, PREWARM_THRESHOLD,
};
use crate::region::Region;

pub struct FreeStoreHandle<'a> {
    region: &'a Region,
    offset: u64,
}

impl<'a> FreeStoreHandle<'a> {
    pub fn at(region: &'a Region, offset: u64) -> Self {
        FreeStoreHandle { region, offset }
    }

    /// Bump-allocate a `FreeStore` and pre-warm every size class at or below
    /// [`PREWARM_THRESHOLD`] with [`PREWARM_COUNT`] nodes, so the first
    /// handful of small `Set`s never have to grow on the hot path.
    pub fn init(region: &'a Region) -> Result<u64> {
        let alloc = BumpAllocator::new(region);
        let offset = alloc.alloc(
            std::mem::size_of::<FreeStore>() as u64,
            std::mem::align_of::<FreeStore>() as u64,
        )?;

        let store = region.resolve_mut::<FreeStore>(offset);
        for (i, list) in store.lists.iter_mut().enumerate() {
            list.index = i as u8;
            list.size = class_size(i as u8);
            list.len = 0;
            list.head_offset = 0;
        }

        let handle = FreeStoreHandle { region, offset };
        for i in 0..NUM_SIZE_CLASSES {
            if class_size(i as u8) <= PREWARM_THRESHOLD {
                handle.grow(i as u8, PREWARM_COUNT)?;
            }
        }
        Ok(offset)
    }

    fn store(&self) -> &mut FreeStore {
        self.region.resolve_mut::<FreeStore>(self.offset)
    }

    fn list(&self, index: u8) -> &mut FreeList {
        &mut self.store().lists[index as usize]
    }

    /// Pop a node off size class `index`'s free list, growing it first if
    /// empty. Returns the offset of the node's `DataNodeHeader`.
    pub fn alloc(&self, index: u8) -> Result<u64> {
        if index as usize >= NUM_SIZE_CLASSES {
            return Err(CacheError::IndexOutOfRange(index as u32));
        }
        if self.list(index).len == 0 {
            self.grow(index, batch_count(index))?;
        }
        let list = self.list(index);
        if list.len == 0 {
            return Err(CacheError::NoSpace { index });
        }
        let node_offset = list.head_offset;
        let next = {
            let header = self.region.resolve::<crate::region::layout::DataNodeHeader>(node_offset);
            header.next
        };
        list.head_offset = next;
        list.len -= 1;
        Ok(node_offset)
    }

    /// Push a node back onto size class `index`'s free list.
    pub fn free(&self, index: u8, node_offset: u64) {
        let list = self.list(index);
        let header = self
            .region
            .resolve_mut::<crate::region::layout::DataNodeHeader>(node_offset);
        header.next = list.head_offset;
        header.free_index = index;
        list.head_offset = node_offset;
        list.len += 1;
    }

    /// Bump-allocate one block big enough for `count` nodes of size class
    /// `index`, then carve it into `count` nodes at fixed `stride` offsets
    /// and thread them onto the free list. One bump-allocator call per grow
    /// (not one per node) so every node in the batch lands at
    /// `block_offset + k * stride` with no inter-node alignment padding —
    /// required for the node-address invariant in the data model.
    fn grow(&self, index: u8, count: u64) -> Result<()> {
        let alloc = BumpAllocator::new(self.region);
        let stride = node_stride(index);
        let block_offset = alloc.alloc(stride * count, DATA_NODE_HEADER_SIZE.max(8))?;
        for k in 0..count {
            let node_offset = block_offset + k * stride;
            self.free(index, node_offset);
        }
        Ok(())
    }

    pub fn len(&self, index: u8) -> u64 {
        self.list(index).len
    }
}

/// How many nodes to carve on a cold grow: enough to cover one `PAGE_SIZE`
/// batch of this class, at least 1.
fn batch_count(index: u8) -> u64 {
    PAGE_SIZE.div_ceil(node_stride(index)).max(1)
}
