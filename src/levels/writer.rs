// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    entry::ENTRY_SIZE,
    inline_ptr::{InlinePtr, MAX_OFFSET},
    Entry, Item,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Buffer size of level file handles
pub const WRITE_BUFFER_BYTES: usize = 64 * 1_024;

/// Buffered appender that knows its logical write position
pub struct WriteHandle {
    path: PathBuf,
    file: BufWriter<File>,
    pos: u64,
}

impl WriteHandle {
    pub fn create<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let file = File::create(path).inspect_err(|e| {
            log::error!("Failed to create level file at {}: {e:?}", path.display());
        })?;

        Ok(Self {
            path: path.into(),
            file: BufWriter::with_capacity(WRITE_BUFFER_BYTES, file),
            pos: 0,
        })
    }

    /// Position the next appended byte will land at
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn append(&mut self, bytes: &[u8]) -> crate::Result<()> {
        self.file.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// Flushes buffered bytes, then fsyncs the file
    pub fn finish(mut self) -> crate::Result<u64> {
        self.file.flush()?;
        self.file.get_mut().sync_all().inspect_err(|e| {
            log::error!("Failed to fsync {}: {e:?}", self.path.display());
        })?;

        Ok(self.pos)
    }
}

/// Result of writing a level file pair
#[derive(Debug, Default)]
pub struct Metadata {
    /// Number of entries written
    pub item_count: u64,

    /// Number of tombstones that were dropped instead of written
    pub evicted_tombstones: u64,

    /// Size of the entries file
    pub entries_bytes: u64,

    /// Size of the values file
    pub values_bytes: u64,
}

/// Writes a sorted item stream into an entries file + values file pair
///
/// Out-of-line keys and values are appended to the values file, and the
/// entry pointers are rewritten to their position in it.
pub struct Writer {
    entries: WriteHandle,
    values: WriteHandle,
    buf: Vec<u8>,

    /// Drop tombstones, only valid if nothing older can be shadowed
    evict_tombstones: bool,

    meta: Metadata,
}

impl Writer {
    pub fn new<P: AsRef<Path>>(
        entries_path: P,
        values_path: P,
        evict_tombstones: bool,
    ) -> crate::Result<Self> {
        Ok(Self {
            entries: WriteHandle::create(entries_path)?,
            values: WriteHandle::create(values_path)?,
            buf: Vec::with_capacity(ENTRY_SIZE),
            evict_tombstones,
            meta: Metadata::default(),
        })
    }

    fn append_out_of_line(&mut self, ptr: &mut InlinePtr, bytes: &[u8]) -> crate::Result<()> {
        if !ptr.is_pointer() {
            return Ok(());
        }

        let offset = self.values.pos();

        if offset > MAX_OFFSET {
            return Err(crate::Error::OffsetOverflow(offset));
        }

        ptr.set_offset(offset);
        self.values.append(bytes)
    }

    /// Writes an item, items need to be written in ascending key order
    pub fn write(&mut self, item: &Item) -> crate::Result<()> {
        if self.evict_tombstones && item.is_tombstone() {
            self.meta.evicted_tombstones += 1;
            return Ok(());
        }

        let mut entry = Entry::from_bytes(&item.key, item.value.as_deref());

        self.append_out_of_line(&mut entry.key, &item.key)?;

        if let Some(value) = &item.value {
            self.append_out_of_line(&mut entry.value, value)?;
        }

        self.buf.clear();
        entry.encode_into(&mut self.buf)?;
        self.entries.append(&self.buf)?;

        self.meta.item_count += 1;

        Ok(())
    }

    /// Makes both files durable: values first, so entries never reference unwritten bytes
    pub fn finish(self) -> crate::Result<Metadata> {
        let mut meta = self.meta;

        meta.values_bytes = self.values.finish()?;
        meta.entries_bytes = self.entries.finish()?;

        Ok(meta)
    }
}
