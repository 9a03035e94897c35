// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod reader;
pub mod recovery;
pub mod writer;


use self::writer::PersistMode;
use crate::Item;
use recovery::RecoveryResult;
use std::path::Path;
use writer::Writer;

/// Write-ahead log mirroring every memtable mutation
pub struct Journal {
    writer: Writer,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        log::trace!("Dropping journal, trying to flush");

        match self.persist(PersistMode::SyncAll) {
            Ok(()) => {
                log::trace!("Flushed journal successfully");
            }
            Err(e) => {
                log::error!("Flush error on drop: {e:?}");
            }
        }
    }
}

impl Journal {
    /// Opens the journal for appending, creating it if needed
    ///
    /// If `sync` is set, every record is flushed and fsynced before
    /// [`Journal::write`] returns.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> crate::Result<Self> {
        let path = path.as_ref();
        log::trace!("Opening journal at {}, sync={sync}", path.display());

        Ok(Self {
            writer: Writer::open(path, sync)?,
        })
    }

    /// Replays the journal at `path`, see [`recovery::recover_journal`]
    pub fn recover<P, F>(path: P, apply: F) -> crate::Result<RecoveryResult>
    where
        P: AsRef<Path>,
        F: FnMut(Item) -> crate::Result<()>,
    {
        recovery::recover_journal(path, apply)
    }

    pub fn path(&self) -> &Path {
        &self.writer.path
    }

    /// Size of the journal file, not counting buffered bytes
    #[cfg(test)]
    pub fn len(&self) -> crate::Result<u64> {
        self.writer.len()
    }

    /// Appends a record, returns the number of bytes written
    pub fn write(&mut self, key: &[u8], value: Option<&[u8]>) -> crate::Result<usize> {
        self.writer.write_raw(key, value).inspect_err(|e| {
            log::error!("Failed to write to journal {:?}: {e:?}", self.writer.path);
        })
    }

    /// Persists the journal.
    pub fn persist(&mut self, mode: PersistMode) -> crate::Result<()> {
        self.writer.persist(mode).map_err(Into::into)
    }

    /// Drops every record
    ///
    /// Only called after a compaction has durably captured all of them.
    pub fn truncate(&mut self) -> crate::Result<()> {
        self.writer.truncate().inspect_err(|e| {
            log::error!("Failed to truncate journal {:?}: {e:?}", self.writer.path);
        })
    }
}
