//! Per-shard hash index: separate chaining over a fixed bucket array.
//!
//! Each bucket holds the offset of the first node in a singly-linked
//! collision chain, threaded through `DataNodeHeader::next` — the same
//! field a free node uses to link to the next free node. A node is only
//! ever on one of those two chains at a time, so there's no ambiguity in
//! reusing the field.
//!
//! Buckets are never resized: `bucket_count` is fixed at shard-init time
//! from `ceil(max_len / 0.75)`, rounded up to a prime. Long chains are
//! bounded in practice by admission control capping how many live entries a
//! shard ever holds.

use crate::allocator::BumpAllocator;
use crate::error::Result;
use crate::region::layout::{
    next_prime, Bucket, DataNodeHeader, ElementHeader, HashmapHeader, DATA_NODE_HEADER_SIZE, ELEMENT_HEADER_SIZE,
};
use crate::region::Region;

pub struct HashmapHandle<'a> {
    region: &'a Region,
    offset: u64,
}

impl<'a> HashmapHandle<'a> {
    pub fn at(region: &'a Region, offset: u64) -> Self {
        HashmapHandle { region, offset }
    }

    /// Bump-allocate the header and bucket array sized for `max_len`
    /// entries at load factor 0.75.
    pub fn init(region: &'a Region, max_len: u64) -> Result<u64> {
        let alloc = BumpAllocator::new(region);
        let bucket_count = next_prime(((max_len as f64 / 0.75).ceil() as u64).max(1));

        let header_offset = alloc.alloc(
            std::mem::size_of::<HashmapHeader>() as u64,
            std::mem::align_of::<HashmapHeader>() as u64,
        )?;
        let buckets_offset = alloc.alloc(
            bucket_count * std::mem::size_of::<Bucket>() as u64,
            std::mem::align_of::<Bucket>() as u64,
        )?;

        let header = region.resolve_mut::<HashmapHeader>(header_offset);
        header.len = 0;
        header.bucket_count = bucket_count;
        header.buckets_offset = buckets_offset;

        for i in 0..bucket_count {
            let bucket = bucket_mut(region, buckets_offset, i);
            bucket.chain_len = 0;
            bucket.head_offset = 0;
        }

        Ok(header_offset)
    }

    fn header(&self) -> &mut HashmapHeader {
        self.region.resolve_mut::<HashmapHeader>(self.offset)
    }

    fn bucket_index(&self, hash: u64) -> u64 {
        hash % self.header().bucket_count
    }

    fn key_bytes(&self, node_offset: u64, key_len: u32) -> &'a [u8] {
        let key_offset = node_offset + DATA_NODE_HEADER_SIZE + ELEMENT_HEADER_SIZE;
        self.region.bytes_mut(key_offset, key_len as u64)
    }

    /// Find the node whose key equals `key`, returning its node offset.
    pub fn find(&self, hash: u64, key: &[u8]) -> Option<u64> {
        let bucket_idx = self.bucket_index(hash);
        let mut cur = bucket_mut(self.region, self.header().buckets_offset, bucket_idx).head_offset;
        while cur != 0 {
            let header = self.region.resolve::<DataNodeHeader>(cur);
            let elem = self
                .region
                .resolve::<ElementHeader>(cur + DATA_NODE_HEADER_SIZE);
            if elem.key_len as usize == key.len() && self.key_bytes(cur, elem.key_len) == key {
                return Some(cur);
            }
            cur = header.next;
        }
        None
    }

    /// Head-insert `node_offset` into the chain for `hash`. The node's
    /// `ElementHeader` (key/value bytes included) must already be written.
    pub fn insert(&self, hash: u64, node_offset: u64) {
        let bucket_idx = self.bucket_index(hash);
        let buckets_offset = self.header().buckets_offset;
        let bucket = bucket_mut(self.region, buckets_offset, bucket_idx);
        let old_head = bucket.head_offset;
        self.region.resolve_mut::<DataNodeHeader>(node_offset).next = old_head;
        bucket.head_offset = node_offset;
        bucket.chain_len += 1;
        self.header().len += 1;
    }

    /// Unlink the node whose key equals `key`, returning its node offset if
    /// present. Walks with a trailing pointer since the chain is singly
    /// linked.
    pub fn remove(&self, hash: u64, key: &[u8]) -> Option<u64> {
        let bucket_idx = self.bucket_index(hash);
        let buckets_offset = self.header().buckets_offset;
        let bucket = bucket_mut(self.region, buckets_offset, bucket_idx);

        let mut prev: u64 = 0;
        let mut cur = bucket.head_offset;
        while cur != 0 {
            let elem = self
                .region
                .resolve::<ElementHeader>(cur + DATA_NODE_HEADER_SIZE);
            let matches = elem.key_len as usize == key.len() && self.key_bytes(cur, elem.key_len) == key;
            let next = self.region.resolve::<DataNodeHeader>(cur).next;
            if matches {
                if prev == 0 {
                    bucket.head_offset = next;
                } else {
                    self.region.resolve_mut::<DataNodeHeader>(prev).next = next;
                }
                bucket.chain_len -= 1;
                self.header().len -= 1;
                return Some(cur);
            }
            prev = cur;
            cur = next;
        }
        None
    }

    pub fn len(&self) -> u64 {
        self.header().len
    }
}

fn bucket_mut(region: &Region, buckets_offset: u64, index: u64) -> &mut Bucket {
    let offset = buckets_offset + index * std::mem::size_of::<Bucket>() as u64;
    region.resolve_mut::<Bucket>(offset)
}
