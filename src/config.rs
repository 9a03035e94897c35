// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{MemtableKind, Stats, Store};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Store configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Folder path
    pub(crate) path: PathBuf,

    /// Memtable size in bytes that triggers a compaction
    ///
    /// Defaults to 16 MiB
    pub(crate) memtable_capacity: u64,

    /// Do not log writes, giving up crash durability
    ///
    /// Defaults to false
    pub(crate) no_wal: bool,

    /// Buffer journal writes instead of fsyncing every write
    ///
    /// Defaults to false
    pub(crate) no_wal_sync: bool,

    /// Memtable strategy
    ///
    /// Defaults to [`MemtableKind::Heap`]
    pub(crate) memtable_kind: MemtableKind,

    /// Maximum number of level slots
    ///
    /// Defaults to 32
    pub(crate) max_levels: usize,

    pub(crate) stats: Option<Arc<Stats>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: ".strata.data".into(),
            memtable_capacity: 16 * 1_024 * 1_024,
            no_wal: false,
            no_wal_sync: false,
            memtable_kind: MemtableKind::default(),
            max_levels: 32,
            stats: None,
        }
    }
}

impl Config {
    /// Initializes a new config
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().into(),
            ..Default::default()
        }
    }

    /// Sets the memtable capacity in bytes (default: 16 MiB)
    ///
    /// Once the memtable reaches it, it is compacted into a new level.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is 0.
    #[must_use]
    pub fn memtable_capacity(mut self, bytes: u64) -> Self {
        assert!(bytes > 0);

        self.memtable_capacity = bytes;
        self
    }

    /// Disables the journal (default: false)
    ///
    /// Writes that were not compacted are lost on a crash.
    #[must_use]
    pub fn no_wal(mut self, flag: bool) -> Self {
        self.no_wal = flag;
        self
    }

    /// Disables fsyncing the journal on every write (default: false)
    ///
    /// Journal writes are buffered and only made durable when the buffer
    /// fills up, on compaction, or on [`Store::persist`].
    #[must_use]
    pub fn no_wal_sync(mut self, flag: bool) -> Self {
        self.no_wal_sync = flag;
        self
    }

    /// Sets the memtable strategy (default: [`MemtableKind::Heap`])
    #[must_use]
    pub fn memtable_kind(mut self, kind: MemtableKind) -> Self {
        self.memtable_kind = kind;
        self
    }

    /// Sets the maximum number of level slots (default: 32)
    ///
    /// Slots fill like a binary counter, so `n` slots hold up to
    /// `2^n - 1` compactions.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn max_levels(mut self, n: usize) -> Self {
        assert!(n > 0);

        self.max_levels = n;
        self
    }

    /// Sets a statistics sink the store reports into
    #[must_use]
    pub fn stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Opens a store using the config
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or existing data is corrupted.
    pub fn open(self) -> crate::Result<Store> {
        Store::open(self)
    }
}
