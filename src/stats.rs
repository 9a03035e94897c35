// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed};

/// Ephemeral, runtime stats
///
/// Share one instance with a store through [`crate::Config::stats`].
#[derive(Debug, Default)]
pub struct Stats {
    /// Bytes appended to the journal
    pub(crate) journal_bytes_written: AtomicU64,

    /// Bytes written to level files
    pub(crate) level_bytes_written: AtomicU64,

    /// Journal records replayed on open
    pub(crate) records_recovered: AtomicUsize,

    /// Number of completed compactions
    pub(crate) compactions_completed: AtomicUsize,

    /// Time spent in compactions (in µs)
    pub(crate) time_compacting: AtomicU64,
}

impl Stats {
    /// Bytes appended to the journal
    #[must_use]
    pub fn journal_bytes_written(&self) -> u64 {
        self.journal_bytes_written.load(Relaxed)
    }

    /// Bytes written to level files (entries + values)
    #[must_use]
    pub fn level_bytes_written(&self) -> u64 {
        self.level_bytes_written.load(Relaxed)
    }

    /// Journal records replayed when opening stores
    #[must_use]
    pub fn records_recovered(&self) -> usize {
        self.records_recovered.load(Relaxed)
    }

    /// Number of completed compactions
    #[must_use]
    pub fn compactions_completed(&self) -> usize {
        self.compactions_completed.load(Relaxed)
    }

    /// Time spent in compactions (in µs)
    #[must_use]
    pub fn time_compacting(&self) -> u64 {
        self.time_compacting.load(Relaxed)
    }
}
