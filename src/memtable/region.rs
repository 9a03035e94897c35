// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{entry::compare_keys, inline_ptr::InlinePtr, Entry, Item, Slice};
use std::cmp::Ordering;

/// Growable byte arena holding the out-of-line bytes of a memtable
///
/// Only ever appended to, until [`Region::clear`].
#[derive(Debug, Default)]
pub struct Region {
    data: Vec<u8>,
}

impl Region {
    /// Creates an empty region with preallocated room
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Describes `bytes`, appending them to the region if they do not fit inline
    pub fn push(&mut self, bytes: &[u8]) -> InlinePtr {
        let mut ptr = InlinePtr::new(bytes);

        if ptr.is_pointer() {
            ptr.set_offset(self.data.len() as u64);
            self.data.extend_from_slice(bytes);
        }

        ptr
    }

    /// Like [`Region::push`], `None` is stored as a null pointer
    pub fn push_option(&mut self, bytes: Option<&[u8]>) -> InlinePtr {
        bytes.map_or(InlinePtr::Null, |bytes| self.push(bytes))
    }

    /// Resolves a pointer that was handed out by this region
    ///
    /// # Errors
    ///
    /// Fails if the pointer does not belong to this region.
    pub fn resolve<'a>(&'a self, ptr: &'a InlinePtr) -> crate::Result<Option<&'a [u8]>> {
        ptr.resolve(&self.data)
    }

    /// Resolves a key pointer that was handed out by this region
    ///
    /// # Panics
    ///
    /// Panics if the pointer was not created by this region, which is a logic bug.
    #[must_use]
    pub fn key<'a>(&'a self, ptr: &'a InlinePtr) -> &'a [u8] {
        #[allow(clippy::expect_used)]
        self.resolve(ptr)
            .expect("memtable pointer should resolve")
            .unwrap_or_default()
    }

    /// Orders two key pointers of this region
    #[must_use]
    pub fn compare(&self, a: &InlinePtr, b: &InlinePtr) -> Ordering {
        compare_keys(a, b, |ptr| self.key(ptr))
    }

    /// Orders a key pointer of this region against raw key bytes
    #[must_use]
    pub fn compare_with(&self, ptr: &InlinePtr, key: &[u8], key_prefix: u64) -> Ordering {
        match ptr.prefix().cmp(&key_prefix) {
            Ordering::Equal => self.key(ptr).cmp(key),
            other => other,
        }
    }

    /// Materializes an entry of this region into an owned item
    ///
    /// # Errors
    ///
    /// Fails if a pointer does not belong to this region.
    pub fn item(&self, entry: &Entry) -> crate::Result<Item> {
        let key = self.resolve(&entry.key)?.unwrap_or_default();
        let value = self.resolve(&entry.value)?;

        Ok(Item {
            key: Slice::new(key),
            value: value.map(Slice::new),
        })
    }

    /// Number of bytes stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no bytes are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drops all bytes, invalidating every pointer handed out so far
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
