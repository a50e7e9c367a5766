//! Per-shard, per-size-class recency lists.
//!
//! Each size class gets its own sentinel-rooted intrusive doubly-linked
//! list, threaded through the `lru_prev`/`lru_next` fields of the
//! [`ElementHeader`] living at the front of each node's payload. The
//! sentinel (`LruList::root`) is never a real entry — an empty list has
//! `root.prev == root.next == root_offset`. This is what lets
//! `move_to_front`/`remove` be branch-free: the node before the true head is
//! always the root, never a null check.

use crate::region::layout::{ElementHeader, LruNode, LruStore, DATA_NODE_HEADER_SIZE, NUM_SIZE_CLASSES};
use crate::region::Region;

pub struct LruStoreHandle<'a> {
    region: &'a Region,
    offset: u64,
}

impl<'a> LruStoreHandle<'a> {
    pub fn at(region: &'a Region, offset: u64) -> Self {
        LruStoreHandle { region, offset }
    }

    pub fn init(region: &'a Region, offset: u64) {
        let store = region.resolve_mut::<LruStore>(offset);
        for (i, list) in store.lists.iter_mut().enumerate() {
            let root_offset = root_offset_of(offset, i);
            list.root = LruNode {
                prev: root_offset,
                next: root_offset,
            };
            list.len = 0;
        }
    }

    fn store(&self) -> &mut LruStore {
        self.region.resolve_mut::<LruStore>(self.offset)
    }

    fn root_offset(&self, index: u8) -> u64 {
        root_offset_of(self.offset, index as usize)
    }

    fn element(&self, node_offset: u64) -> &mut ElementHeader {
        self.region
            .resolve_mut::<ElementHeader>(node_offset + DATA_NODE_HEADER_SIZE)
    }

    /// `prev`/`next` of a list node: the sentinel's come from its `LruNode`,
    /// a real entry's from its `ElementHeader`.
    fn link(&self, index: u8, node_offset: u64) -> (u64, u64) {
        if node_offset == self.root_offset(index) {
            let root = &self.store().lists[index as usize].root;
            (root.prev, root.next)
        } else {
            let e = self.element(node_offset);
            (e.lru_prev, e.lru_next)
        }
    }

    fn set_prev(&self, index: u8, node_offset: u64, prev: u64) {
        if node_offset == self.root_offset(index) {
            self.store().lists[index as usize].root.prev = prev;
        } else {
            self.element(node_offset).lru_prev = prev;
        }
    }

    fn set_next(&self, index: u8, node_offset: u64, next: u64) {
        if node_offset == self.root_offset(index) {
            self.store().lists[index as usize].root.next = next;
        } else {
            self.element(node_offset).lru_next = next;
        }
    }

    /// Splice `node_offset` out of its current position (a no-op if it's
    /// not linked in, callers only call this on entries already in the
    /// list).
    fn unlink(&self, index: u8, node_offset: u64) {
        let (prev, next) = self.link(index, node_offset);
        self.set_next(index, prev, next);
        self.set_prev(index, next, prev);
    }

    /// Insert `node_offset` directly after the root (most-recently-used end).
    pub fn push_front(&self, index: u8, node_offset: u64) {
        let root = self.root_offset(index);
        let old_front = self.link(index, root).1;
        self.set_next(index, root, node_offset);
        self.set_prev(index, node_offset, root);
        self.set_next(index, node_offset, old_front);
        self.set_prev(index, old_front, node_offset);
        self.store().lists[index as usize].len += 1;
    }

    /// Move an already-linked entry to the front, the original's `MoveToFront`.
    pub fn move_to_front(&self, index: u8, node_offset: u64) {
        let root = self.root_offset(index);
        if self.link(index, root).1 == node_offset {
            return;
        }
        self.unlink(index, node_offset);
        self.store().lists[index as usize].len -= 1;
        self.push_front(index, node_offset);
    }

    /// Remove an entry from its list entirely (it's about to be freed or
    /// overwritten).
    pub fn remove(&self, index: u8, node_offset: u64) {
        self.unlink(index, node_offset);
        self.store().lists[index as usize].len -= 1;
    }

    /// The least-recently-used entry (the node just before the root), or
    /// `None` if the list is empty.
    pub fn back(&self, index: u8) -> Option<u64> {
        let root = self.root_offset(index);
        let tail = self.link(index, root).0;
        if tail == root {
            None
        } else {
            Some(tail)
        }
    }

    pub fn len(&self, index: u8) -> u64 {
        self.store().lists[index as usize].len
    }
}

fn root_offset_of(store_offset: u64, index: usize) -> u64 {
    store_offset
        + std::mem::offset_of!(LruStore, lists) as u64
        + (index * std::mem::size_of::<crate::region::layout::LruList>()) as u64
        + std::mem::offset_of!(crate::region::layout::LruList, root) as u64
}

#[allow(dead_code)]
const _: () = assert!(NUM_SIZE_CLASSES == 25);
