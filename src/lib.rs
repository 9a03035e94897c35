// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Strata is a log-structured embeddable key-value storage engine written in Rust. It features:
//!
//! - Thread-safe, synchronous API
//! - 100% safe & stable Rust
//! - Write-ahead log with crash recovery
//! - Small keys and values are stored inline in fixed-size 32-byte entries
//! - Interchangeable memtable strategies (binary heap, B-tree, skip list, sharded)
//! - Compaction into immutable, sorted level file pairs
//!
//! It is not:
//!
//! - a standalone server
//! - a relational or wide-column database: it has no notion of columns
//!
//! Keys and values are limited to 65535 bytes.
//!
//! ```
//! use strata::{Config, PersistMode};
//! #
//! # let folder = tempfile::tempdir()?;
//!
//! let store = Config::new(&folder).open()?;
//!
//! // Write some data
//! store.set_string("a", b"hello")?;
//! store.set_bytes(b"b", b"world")?;
//!
//! // And retrieve it
//! let bytes = store.get("a")?;
//! assert_eq!(Some(&b"hello"[..]), bytes.as_deref());
//!
//! // Or remove it again
//! store.remove("a")?;
//! assert!(store.get("a")?.is_none());
//!
//! // All live pairs, in key order
//! for (key, value) in store.scan()? {
//!   // ...
//! }
//!
//! // Move the memtable into a level and drop the journal
//! store.compact_and_sync()?;
//!
//! // Sync the journal to disk to make sure data is definitely durable
//! // When the store is dropped, it will try to persist with `PersistMode::SyncAll` as well
//! store.persist(PersistMode::SyncAll)?;
//!
//! store.close()?;
//! #
//! # Ok::<_, strata::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]

mod compaction;
mod config;
mod entry;
mod error;
mod file;
mod inline_ptr;
mod journal;
mod levels;
mod memtable;
mod merge;
mod path;
mod stats;
mod store;
mod value;

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, xxhash_rust::xxh3::Xxh3Builder>;

/// Immutable, cheaply clonable byte slice
pub use byteview::ByteView as Slice;

pub use {
    config::Config,
    entry::{Entry, ENTRY_SIZE},
    error::{Error, Result},
    inline_ptr::{InlinePtr, Tag, INLINE_PTR_SIZE, MAX_INLINE_LEN, MAX_OFFSET},
    journal::writer::PersistMode,
    memtable::{
        BTreeMemtable, HeapMemtable, InsertOutcome, Memtable, MemtableKind, Region,
        ShardedMemtable, SkipMemtable,
    },
    merge::{BoxedSource, MergeIterator},
    stats::Stats,
    store::Store,
    value::{Item, KvPair, UserKey, UserValue},
};
