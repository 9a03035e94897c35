// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Entry;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Buffered journal bytes are written out once the buffer reaches this size
pub const JOURNAL_BUFFER_BYTES: usize = 4 * 1_024;

/// The persist mode allows setting the durability guarantee of previous writes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PersistMode {
    /// Flushes data to OS buffers. This allows the OS to write out data in case of an
    /// application crash.
    ///
    /// When this function returns, data is **not** guaranteed to be persisted in case
    /// of a power loss event or OS crash.
    Buffer,

    /// Flushes data using `fdatasync`.
    ///
    /// Use if you know that `fdatasync` is sufficient for your file system and/or operating system.
    SyncData,

    /// Flushes data + metadata using `fsync`.
    SyncAll,
}

pub struct Writer {
    pub(crate) path: PathBuf,
    file: BufWriter<File>,
    buf: Vec<u8>,

    /// Flush + fsync after every record
    sync: bool,

    is_buffer_dirty: bool,
}

impl Writer {
    /// Opens the journal for appending, creating it if it does not exist
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> crate::Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .inspect_err(|e| {
                log::error!("Failed to open journal at {}: {e:?}", path.display());
            })?;

        Ok(Self {
            path: path.into(),
            file: BufWriter::with_capacity(JOURNAL_BUFFER_BYTES, file),
            buf: Vec::with_capacity(JOURNAL_BUFFER_BYTES),
            sync,
            is_buffer_dirty: false,
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> crate::Result<u64> {
        Ok(self.file.get_ref().metadata()?.len())
    }

    /// Persists the journal file.
    pub(crate) fn persist(&mut self, mode: PersistMode) -> std::io::Result<()> {
        log::trace!("Persist journal {:?} with mode={mode:?}", self.path);

        if self.is_buffer_dirty {
            self.file.flush()?;
            self.is_buffer_dirty = false;
        }

        match mode {
            PersistMode::SyncAll => self.file.get_mut().sync_all(),
            PersistMode::SyncData => self.file.get_mut().sync_data(),
            PersistMode::Buffer => Ok(()),
        }
    }

    /// Appends a record: the entry, followed by its out-of-line key and value bytes
    ///
    /// Returns the number of bytes written.
    pub(crate) fn write_raw(&mut self, key: &[u8], value: Option<&[u8]>) -> crate::Result<usize> {
        let entry = Entry::from_bytes(key, value);

        self.buf.clear();
        entry.encode_into(&mut self.buf)?;

        if entry.key.is_pointer() {
            self.buf.extend_from_slice(key);
        }

        if let Some(value) = value.filter(|_| entry.value.is_pointer()) {
            self.buf.extend_from_slice(value);
        }

        self.is_buffer_dirty = true;
        self.file.write_all(&self.buf)?;

        if self.sync {
            self.persist(PersistMode::SyncAll)?;
        }

        Ok(self.buf.len())
    }

    /// Drops every record, the journal is empty afterwards
    pub(crate) fn truncate(&mut self) -> crate::Result<()> {
        log::trace!("Truncating journal {:?}", self.path);

        // NOTE: Flush first, so no buffered bytes land after the truncation
        self.file.flush()?;
        self.is_buffer_dirty = false;

        let file = self.file.get_mut();
        file.set_len(0)?;
        file.sync_all()?;

        Ok(())
    }
}
