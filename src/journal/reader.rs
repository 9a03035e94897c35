// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::writer::JOURNAL_BUFFER_BYTES;
use crate::{entry::ENTRY_SIZE, inline_ptr::InlinePtr, Entry, Item, Slice};
use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind, Read},
    path::Path,
};

/// Reads journal records in order
///
/// A record that is cut off by the end of the file marks the end of the
/// journal: iteration stops, and [`JournalReader::is_truncated`] reports it.
pub struct JournalReader {
    inner: BufReader<File>,
    consumed: u64,
    is_truncated: bool,
    is_failed: bool,
}

impl JournalReader {
    pub fn new<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path)?;

        Ok(Self {
            inner: BufReader::with_capacity(JOURNAL_BUFFER_BYTES, file),
            consumed: 0,
            is_truncated: false,
            is_failed: false,
        })
    }

    /// Bytes belonging to fully read records
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Returns `true` if the journal ended in a partial record
    pub fn is_truncated(&self) -> bool {
        self.is_truncated
    }

    fn read_data(&mut self, ptr: &InlinePtr) -> crate::Result<Option<Slice>> {
        match ptr {
            InlinePtr::Null => Ok(None),
            InlinePtr::Inline { .. } => Ok(ptr.inline_data().map(Slice::new)),
            InlinePtr::Pointer { len, .. } => {
                let mut buf = vec![0; usize::from(*len)];
                self.inner.read_exact(&mut buf)?;
                Ok(Some(Slice::new(&buf)))
            }
        }
    }

    fn read_record(&mut self) -> crate::Result<Option<Item>> {
        if self.inner.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let entry = Entry::decode_from(&mut self.inner)?;

        let Some(key) = self.read_data(&entry.key)? else {
            return Err(crate::Error::Corrupted("journal record without key"));
        };
        let value = self.read_data(&entry.value)?;

        self.consumed += (ENTRY_SIZE + entry.out_of_line_len()) as u64;

        Ok(Some(Item { key, value }))
    }
}

impl Iterator for JournalReader {
    type Item = crate::Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_truncated || self.is_failed {
            return None;
        }

        match self.read_record() {
            Ok(item) => item.map(Ok),
            Err(crate::Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                self.is_truncated = true;
                None
            }
            Err(e) => {
                self.is_failed = true;
                Some(Err(e))
            }
        }
    }
}
