// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{HeapMemtable, InsertOutcome, Memtable};
use crate::{merge::BoxedSource, Item};
use std::num::NonZeroUsize;
use xxhash_rust::xxh3::xxh3_64;

/// Memtable made of N heap memtables, keys are routed by hash
///
/// Each shard gets `cap / N` bytes and reports its own fullness,
/// so the sharded memtable is full as soon as any shard is.
/// The shards hold disjoint key sets, so iteration yields one sorted
/// iterator per shard.
pub struct ShardedMemtable {
    cap: u64,
    shards: Vec<HeapMemtable>,
}

impl ShardedMemtable {
    /// Creates a sharded memtable
    ///
    /// A shard count of 0 uses the available parallelism.
    #[must_use]
    pub fn new(cap: u64, shards: usize) -> Self {
        let shards = if shards == 0 {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            shards
        };

        let shard_cap = cap / shards as u64;

        Self {
            cap,
            shards: (0..shards).map(|_| HeapMemtable::new(shard_cap)).collect(),
        }
    }

    /// Number of shards
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_idx(&self, key: &[u8]) -> usize {
        // NOTE: Result is less than the shard count
        #[allow(clippy::cast_possible_truncation)]
        let idx = (xxh3_64(key) % self.shards.len() as u64) as usize;
        idx
    }
}

impl Memtable for ShardedMemtable {
    fn insert(&mut self, key: &[u8], value: Option<&[u8]>) -> InsertOutcome {
        let idx = self.shard_idx(key);

        self.shards
            .get_mut(idx)
            .map_or(InsertOutcome::Rejected, |shard| shard.insert(key, value))
    }

    fn get(&self, key: &[u8]) -> Option<Item> {
        self.shards.get(self.shard_idx(key))?.get(key)
    }

    fn iters(&self) -> Vec<BoxedSource<'_>> {
        self.shards.iter().flat_map(Memtable::iters).collect()
    }

    fn key_count(&self) -> usize {
        self.shards.iter().map(Memtable::key_count).sum()
    }

    fn len(&self) -> u64 {
        self.shards.iter().map(Memtable::len).sum()
    }

    fn cap(&self) -> u64 {
        self.cap
    }

    fn reset(&mut self) {
        for shard in &mut self.shards {
            shard.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn sharded_memtable_routes_keys_to_one_shard() {
        let mut memtable = ShardedMemtable::new(u64::MAX, 4);
        assert_eq!(4, memtable.shard_count());

        for idx in 0..100u32 {
            memtable.insert(&idx.to_be_bytes(), Some(b"v"));
            memtable.insert(&idx.to_be_bytes(), Some(b"w"));
        }

        assert_eq!(100, memtable.key_count());
        assert_eq!(4, memtable.iters().len());

        let total = memtable
            .shards
            .iter()
            .map(Memtable::key_count)
            .sum::<usize>();
        assert_eq!(100, total);
        assert!(memtable.shards.iter().all(|shard| !shard.is_empty()));
    }

    #[test]
    fn sharded_memtable_zero_shards_uses_parallelism() {
        let memtable = ShardedMemtable::new(1_024, 0);
        assert!(memtable.shard_count() >= 1);
    }

    #[test]
    fn sharded_memtable_full_when_one_shard_is_full() {
        let mut memtable = ShardedMemtable::new(4 * 64, 4);

        let accepted = (0..1_000u32)
            .take_while(|idx| memtable.set_bytes(&idx.to_be_bytes(), b"v"))
            .count();

        // Every shard has room for two 32-byte entries
        assert!(accepted < 8);
        assert!(memtable.len() < memtable.cap());
    }
}
