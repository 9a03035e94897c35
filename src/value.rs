// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Slice;

/// User defined key
pub type UserKey = Slice;

/// User defined data (byte array)
pub type UserValue = Slice;

/// KV-tuple, typically returned by a scan
pub type KvPair = (UserKey, UserValue);

/// Longest key or value the length fields can describe
pub const MAX_DATA_LEN: usize = u16::MAX as usize;

/// Resolved key/value pair as it travels through iterators
///
/// A value of `None` is a tombstone: it shadows older versions of the key
/// until compaction into the oldest slot drops it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    /// User-defined key - an arbitrary byte array
    ///
    /// Supports up to 2^16 - 1 bytes
    pub key: UserKey,

    /// User-defined value, or `None` for a tombstone
    ///
    /// Supports up to 2^16 - 1 bytes
    pub value: Option<UserValue>,
}

impl Item {
    /// Creates a new [`Item`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use strata::Item;
    /// #
    /// let item = Item::new(b"key-1", Some(b"my-value"));
    /// assert_eq!(b"key-1", &*item.key);
    /// assert!(!item.is_tombstone());
    ///
    /// let item = Item::tombstone(b"key-1");
    /// assert!(item.is_tombstone());
    /// ```
    pub fn new<K: AsRef<[u8]>, V: AsRef<[u8]>>(key: K, value: Option<V>) -> Self {
        Self {
            key: Slice::new(key.as_ref()),
            value: value.map(|v| Slice::new(v.as_ref())),
        }
    }

    /// Creates a deletion marker for `key`
    pub fn tombstone<K: AsRef<[u8]>>(key: K) -> Self {
        Self {
            key: Slice::new(key.as_ref()),
            value: None,
        }
    }

    /// Returns `true` if the item marks a deleted key
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the KV pair, or `None` for tombstones
    #[must_use]
    pub fn into_pair(self) -> Option<KvPair> {
        let Self { key, value } = self;
        value.map(|value| (key, value))
    }
}
