// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{accounted_len, outcome, InsertOutcome, Memtable, Region};
use crate::{merge::BoxedSource, Entry, HashMap, Item};
use std::cmp::Ordering;

/// Memtable backed by a binary min-heap over entry slots
///
/// Key lookup goes through a hash index; ordered iteration drains a copy
/// of the heap by repeated extract-min.
#[derive(Default)]
pub struct HeapMemtable {
    cap: u64,
    region: Region,
    entries: Vec<Entry>,
    heap: Vec<u32>,
    index: HashMap<Box<[u8]>, u32>,
}

impl HeapMemtable {
    /// Creates an empty heap memtable
    #[must_use]
    pub fn new(cap: u64) -> Self {
        Self {
            cap,
            ..Default::default()
        }
    }

    fn slot(&self, idx: u32) -> &Entry {
        #[allow(clippy::expect_used)]
        self.entries
            .get(idx as usize)
            .expect("heap slot should exist")
    }

    fn less(&self, a: u32, b: u32) -> bool {
        self.region.compare(&self.slot(a).key, &self.slot(b).key) == Ordering::Less
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;

            match (self.heap.get(pos), self.heap.get(parent)) {
                (Some(&child), Some(&up)) if self.less(child, up) => {
                    self.heap.swap(pos, parent);
                    pos = parent;
                }
                _ => break,
            }
        }
    }
}

/// Sorted snapshot of a heap memtable
struct Drain<'a> {
    memtable: &'a HeapMemtable,
    heap: Vec<u32>,
}

impl Drain<'_> {
    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            for child in [left, right] {
                if let (Some(&c), Some(&s)) = (self.heap.get(child), self.heap.get(smallest)) {
                    if self.memtable.less(c, s) {
                        smallest = child;
                    }
                }
            }

            if smallest == pos {
                break;
            }

            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }
}

impl Iterator for Drain<'_> {
    type Item = crate::Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.heap.is_empty() {
            return None;
        }

        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let min = self.heap.pop()?;
        self.sift_down(0);

        Some(self.memtable.region.item(self.memtable.slot(min)))
    }
}

impl Memtable for HeapMemtable {
    fn insert(&mut self, key: &[u8], value: Option<&[u8]>) -> InsertOutcome {
        // NOTE: Value bytes go in first, key bytes only for new keys
        let value = self.region.push_option(value);

        if let Some(&idx) = self.index.get(key) {
            if let Some(entry) = self.entries.get_mut(idx as usize) {
                entry.value = value;
            }
        } else {
            let key_ptr = self.region.push(key);

            // NOTE: Slot count is bounded by the byte capacity long before u32::MAX
            #[allow(clippy::cast_possible_truncation)]
            let idx = self.entries.len() as u32;

            self.entries.push(Entry::new(key_ptr, value));
            self.index.insert(key.into(), idx);
            self.heap.push(idx);
            self.sift_up(self.heap.len() - 1);
        }

        outcome(self.len(), self.cap)
    }

    fn get(&self, key: &[u8]) -> Option<Item> {
        let idx = self.index.get(key)?;
        let entry = self.entries.get(*idx as usize)?;

        self.region.item(entry).ok()
    }

    fn iters(&self) -> Vec<BoxedSource<'_>> {
        vec![Box::new(Drain {
            memtable: self,
            heap: self.heap.clone(),
        })]
    }

    fn key_count(&self) -> usize {
        self.entries.len()
    }

    fn len(&self) -> u64 {
        accounted_len(self.entries.len(), &self.region)
    }

    fn cap(&self) -> u64 {
        self.cap
    }

    fn reset(&mut self) {
        self.region.clear();
        self.entries.clear();
        self.heap.clear();
        self.index.clear();
    }
}
