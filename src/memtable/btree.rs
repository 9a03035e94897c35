// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{accounted_len, outcome, InsertOutcome, Memtable, Region};
use crate::{merge::BoxedSource, Entry, Item};
use std::collections::BTreeMap;

/// Memtable backed by an ordered tree
///
/// The tree is keyed by owned key bytes, which also get appended to the
/// region so the accounted size matches the other strategies.
#[derive(Default)]
pub struct BTreeMemtable {
    cap: u64,
    region: Region,
    items: BTreeMap<Box<[u8]>, Entry>,
}

impl BTreeMemtable {
    /// Creates an empty tree memtable
    #[must_use]
    pub fn new(cap: u64) -> Self {
        Self {
            cap,
            ..Default::default()
        }
    }
}

impl Memtable for BTreeMemtable {
    fn insert(&mut self, key: &[u8], value: Option<&[u8]>) -> InsertOutcome {
        let value = self.region.push_option(value);

        if let Some(entry) = self.items.get_mut(key) {
            entry.value = value;
        } else {
            let key_ptr = self.region.push(key);
            self.items.insert(key.into(), Entry::new(key_ptr, value));
        }

        outcome(self.len(), self.cap)
    }

    fn get(&self, key: &[u8]) -> Option<Item> {
        self.items
            .get(key)
            .and_then(|entry| self.region.item(entry).ok())
    }

    fn iters(&self) -> Vec<BoxedSource<'_>> {
        vec![Box::new(
            self.items.values().map(|entry| self.region.item(entry)),
        )]
    }

    fn key_count(&self) -> usize {
        self.items.len()
    }

    fn len(&self) -> u64 {
        accounted_len(self.items.len(), &self.region)
    }

    fn cap(&self) -> u64 {
        self.cap
    }

    fn reset(&mut self) {
        self.region.clear();
        self.items.clear();
    }
}
