// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod btree;
mod heap;
mod region;
mod sharded;
mod skip;

pub use btree::BTreeMemtable;
pub use heap::HeapMemtable;
pub use region::Region;
pub use sharded::ShardedMemtable;
pub use skip::SkipMemtable;

use crate::{entry::ENTRY_SIZE, merge::BoxedSource, Item};

/// Outcome of a memtable insert
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    /// The item was stored and there is still room
    Stored,

    /// The item was stored, but the memtable is now at capacity
    ///
    /// The caller must stop inserting and compact.
    Full,

    /// The item was not stored, because a fixed-capacity structure ran out of room
    ///
    /// The caller must compact, then retry.
    Rejected,
}

/// Memtable strategy, chosen at store construction time
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MemtableKind {
    /// Binary heap over entry slots, drained by extract-min
    #[default]
    Heap,

    /// Ordered tree
    BTree,

    /// Arena skip list with a fixed node table
    SkipList,

    /// Heap memtables, keys routed by hash, one iterator per shard
    Sharded(usize),
}

/// The memtable serves as an intermediary storage for new items
///
/// Every implementation owns a [`Region`] that out-of-line key and value
/// bytes are appended to, and accounts its size as
/// `entries * ENTRY_SIZE + region length`.
pub trait Memtable: Send {
    /// Inserts or updates a key
    ///
    /// Updating an existing key only replaces its value pointer.
    /// A `None` value is a tombstone.
    fn insert(&mut self, key: &[u8], value: Option<&[u8]>) -> InsertOutcome;

    /// Returns the item stored for `key`, tombstones included
    fn get(&self, key: &[u8]) -> Option<Item>;

    /// Returns sorted iterators over a snapshot of the memtable
    ///
    /// Most strategies return a single iterator; sharded memtables return
    /// one per shard, with disjoint key sets.
    fn iters(&self) -> Vec<BoxedSource<'_>>;

    /// Number of distinct keys
    fn key_count(&self) -> usize;

    /// Accounted size in bytes
    fn len(&self) -> u64;

    /// Capacity in bytes
    fn cap(&self) -> u64;

    /// Clears all entries and the byte region
    fn reset(&mut self);

    /// Returns `true` if no keys are stored
    fn is_empty(&self) -> bool {
        self.key_count() == 0
    }

    /// Upserts a value, returns whether the memtable is still under capacity
    fn set_bytes(&mut self, key: &[u8], value: &[u8]) -> bool {
        self.insert(key, Some(value)) == InsertOutcome::Stored
    }

    /// Upserts a value, returns whether the memtable is still under capacity
    fn set_string(&mut self, key: &str, value: &[u8]) -> bool {
        self.set_bytes(key.as_bytes(), value)
    }
}

impl MemtableKind {
    /// Creates an empty memtable of this kind
    #[must_use]
    pub fn create(self, cap: u64) -> Box<dyn Memtable> {
        match self {
            Self::Heap => Box::new(HeapMemtable::new(cap)),
            Self::BTree => Box::new(BTreeMemtable::new(cap)),
            Self::SkipList => Box::new(SkipMemtable::new(cap)),
            Self::Sharded(shards) => Box::new(ShardedMemtable::new(cap, shards)),
        }
    }
}

pub(crate) fn accounted_len(key_count: usize, region: &Region) -> u64 {
    (key_count * ENTRY_SIZE) as u64 + region.len() as u64
}

pub(crate) fn outcome(len: u64, cap: u64) -> InsertOutcome {
    if len < cap {
        InsertOutcome::Stored
    } else {
        InsertOutcome::Full
    }
}
