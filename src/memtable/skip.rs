// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{accounted_len, outcome, InsertOutcome, Memtable, Region};
use crate::{inline_ptr::prefix_of, merge::BoxedSource, Entry, Item};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::cmp::Ordering;

const MAX_HEIGHT: usize = 5;

/// One in `BRANCHING` nodes of a level is promoted to the next level
const BRANCHING: u32 = 4;

/// Default number of nodes a skip list memtable can hold
pub const DEFAULT_NODE_CAPACITY: usize = 1 << 20;

/// Index 0 is the head sentinel, so it doubles as "no successor"
const NIL: u32 = 0;

#[derive(Copy, Clone, Default)]
struct Node {
    entry: Entry,
    next: [u32; MAX_HEIGHT],
}

/// Memtable backed by an arena skip list
///
/// Nodes live in a table with a fixed capacity; once it is exhausted,
/// inserts of new keys are rejected until the memtable is reset.
pub struct SkipMemtable {
    cap: u64,
    node_capacity: usize,
    region: Region,
    nodes: Vec<Node>,
    height: usize,
    rng: StdRng,
}

impl SkipMemtable {
    /// Creates an empty skip list memtable with the default node capacity
    #[must_use]
    pub fn new(cap: u64) -> Self {
        Self::with_node_capacity(cap, DEFAULT_NODE_CAPACITY)
    }

    /// Creates an empty skip list memtable holding at most `node_capacity` keys
    #[must_use]
    pub fn with_node_capacity(cap: u64, node_capacity: usize) -> Self {
        Self {
            cap,
            node_capacity: node_capacity.max(1),
            region: Region::default(),
            nodes: vec![Node::default()],
            height: 1,
            rng: StdRng::seed_from_u64(0x5EED_CAFE),
        }
    }

    fn node(&self, idx: u32) -> &Node {
        #[allow(clippy::expect_used)]
        self.nodes.get(idx as usize).expect("node should exist")
    }

    fn node_mut(&mut self, idx: u32) -> &mut Node {
        #[allow(clippy::expect_used)]
        self.nodes.get_mut(idx as usize).expect("node should exist")
    }

    fn next(&self, idx: u32, level: usize) -> u32 {
        self.node(idx).next.get(level).copied().unwrap_or(NIL)
    }

    /// Returns the rightmost node per level whose key is less than `key`
    fn find_predecessors(&self, key: &[u8]) -> [u32; MAX_HEIGHT] {
        let prefix = prefix_of(key);
        let mut preds = [NIL; MAX_HEIGHT];
        let mut current = NIL;

        for level in (0..self.height).rev() {
            loop {
                let next = self.next(current, level);

                if next == NIL {
                    break;
                }

                let ord = self
                    .region
                    .compare_with(&self.node(next).entry.key, key, prefix);

                if ord == Ordering::Less {
                    current = next;
                } else {
                    break;
                }
            }

            if let Some(pred) = preds.get_mut(level) {
                *pred = current;
            }
        }

        preds
    }

    /// Returns the node holding `key`, if any
    fn find(&self, key: &[u8], preds: &[u32; MAX_HEIGHT]) -> Option<u32> {
        let candidate = self.next(preds.first().copied().unwrap_or(NIL), 0);

        if candidate == NIL {
            return None;
        }

        let node = self.node(candidate);
        (self.region.key(&node.entry.key) == key).then_some(candidate)
    }

    fn random_height(&mut self) -> usize {
        let mut height = 1;

        while height < MAX_HEIGHT && self.rng.random::<u32>() % BRANCHING == 0 {
            height += 1;
        }

        height
    }
}

struct Iter<'a> {
    memtable: &'a SkipMemtable,
    current: u32,
}

impl Iterator for Iter<'_> {
    type Item = crate::Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        self.current = self.memtable.next(self.current, 0);

        if self.current == NIL {
            return None;
        }

        let node = self.memtable.node(self.current);
        Some(self.memtable.region.item(&node.entry))
    }
}

impl Memtable for SkipMemtable {
    fn insert(&mut self, key: &[u8], value: Option<&[u8]>) -> InsertOutcome {
        let preds = self.find_predecessors(key);

        if let Some(existing) = self.find(key, &preds) {
            let value = self.region.push_option(value);
            self.node_mut(existing).entry.value = value;
            return outcome(self.len(), self.cap);
        }

        // The head sentinel does not count towards the node capacity
        if self.nodes.len() > self.node_capacity {
            return InsertOutcome::Rejected;
        }

        let value = self.region.push_option(value);
        let key_ptr = self.region.push(key);

        let height = self.random_height();
        if height > self.height {
            // NOTE: Levels above the old height start at the head, which is what `preds` holds already
            self.height = height;
        }

        // NOTE: Bounded by the node capacity
        #[allow(clippy::cast_possible_truncation)]
        let idx = self.nodes.len() as u32;

        let mut node = Node {
            entry: Entry::new(key_ptr, value),
            next: [NIL; MAX_HEIGHT],
        };

        for (level, pred) in preds.iter().enumerate().take(height) {
            if let Some(next) = node.next.get_mut(level) {
                *next = self.next(*pred, level);
            }
        }

        self.nodes.push(node);

        for (level, pred) in preds.iter().enumerate().take(height) {
            if let Some(next) = self.node_mut(*pred).next.get_mut(level) {
                *next = idx;
            }
        }

        outcome(self.len(), self.cap)
    }

    fn get(&self, key: &[u8]) -> Option<Item> {
        let preds = self.find_predecessors(key);
        let idx = self.find(key, &preds)?;

        self.region.item(&self.node(idx).entry).ok()
    }

    fn iters(&self) -> Vec<BoxedSource<'_>> {
        vec![Box::new(Iter {
            memtable: self,
            current: NIL,
        })]
    }

    fn key_count(&self) -> usize {
        self.nodes.len() - 1
    }

    fn len(&self) -> u64 {
        accounted_len(self.key_count(), &self.region)
    }

    fn cap(&self) -> u64 {
        self.cap
    }

    fn reset(&mut self) {
        self.region.clear();
        self.nodes.truncate(1);

        if let Some(head) = self.nodes.first_mut() {
            *head = Node::default();
        }

        self.height = 1;
    }
}
