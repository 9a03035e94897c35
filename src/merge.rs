// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{inline_ptr::prefix_of, Item};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Sorted item source feeding a [`MergeIterator`]
pub type BoxedSource<'a> = Box<dyn Iterator<Item = crate::Result<Item>> + 'a>;

struct HeapItem {
    prefix: u64,
    item: Item,
    source: usize,
}

impl HeapItem {
    fn new(item: Item, source: usize) -> Self {
        Self {
            prefix: prefix_of(&item.key),
            item,
            source,
        }
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.prefix, &*self.item.key, self.source).cmp(&(
            other.prefix,
            &*other.item.key,
            other.source,
        ))
    }
}

/// This iterator can iterate through N sorted iterators simultaneously in order
///
/// This is achieved by advancing the iterator that yields the lowest item
/// and merging using a simple k-way merge algorithm.
///
/// Sources are ordered from newest to oldest: if multiple sources yield
/// the same key, only the item from the lowest source index is emitted.
/// Every item is yielded together with the index of its source.
pub struct MergeIterator<'a> {
    sources: Vec<BoxedSource<'a>>,
    heap: BinaryHeap<Reverse<HeapItem>>,
    prev_key: Option<crate::UserKey>,
    initialized: bool,
    failed: bool,
}

impl<'a> MergeIterator<'a> {
    /// Initializes a new merge iterator, sources ordered newest first
    #[must_use]
    pub fn new(sources: Vec<BoxedSource<'a>>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            prev_key: None,
            initialized: false,
            failed: false,
        }
    }

    fn advance(&mut self, source: usize) -> crate::Result<()> {
        if let Some(iter) = self.sources.get_mut(source) {
            if let Some(item) = iter.next() {
                self.heap.push(Reverse(HeapItem::new(item?, source)));
            }
        }

        Ok(())
    }

    fn initialize(&mut self) -> crate::Result<()> {
        for source in 0..self.sources.len() {
            self.advance(source)?;
        }

        self.initialized = true;

        Ok(())
    }

    fn next_item(&mut self) -> crate::Result<Option<(Item, usize)>> {
        if !self.initialized {
            self.initialize()?;
        }

        while let Some(Reverse(head)) = self.heap.pop() {
            self.advance(head.source)?;

            // NOTE: Equal keys pop in source order, so the first one is the newest
            if self.prev_key.as_ref() == Some(&head.item.key) {
                continue;
            }

            self.prev_key = Some(head.item.key.clone());
            return Ok(Some((head.item, head.source)));
        }

        Ok(None)
    }
}

impl Iterator for MergeIterator<'_> {
    type Item = crate::Result<(Item, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_item() {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
