// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{entry::ENTRY_SIZE, inline_ptr::InlinePtr, Entry, Item, Slice};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

const READ_BUFFER_BYTES: usize = 64 * 1_024;

/// Sequential reader over a level file pair
///
/// Values were written in entry order, so the reader streams both files
/// side by side and checks that every pointer continues where the
/// previous one ended.
pub struct LevelReader {
    entries: BufReader<File>,
    values: BufReader<File>,
    values_pos: u64,
    remaining: u64,
    is_failed: bool,
}

impl LevelReader {
    pub fn new<P: AsRef<Path>>(entries_path: P, values_path: P) -> crate::Result<Self> {
        let entries = File::open(entries_path)?;
        let remaining = entries.metadata()?.len() / ENTRY_SIZE as u64;

        Ok(Self {
            entries: BufReader::with_capacity(READ_BUFFER_BYTES, entries),
            values: BufReader::with_capacity(READ_BUFFER_BYTES, File::open(values_path)?),
            values_pos: 0,
            remaining,
            is_failed: false,
        })
    }

    fn read_data(&mut self, ptr: &InlinePtr) -> crate::Result<Option<Slice>> {
        match ptr {
            InlinePtr::Null => Ok(None),
            InlinePtr::Inline { .. } => Ok(ptr.inline_data().map(Slice::new)),
            InlinePtr::Pointer { len, offset, .. } => {
                if *offset != self.values_pos {
                    return Err(crate::Error::Corrupted("value offsets out of sequence"));
                }

                let mut buf = vec![0; usize::from(*len)];
                self.values.read_exact(&mut buf)?;
                self.values_pos += u64::from(*len);

                Ok(Some(Slice::new(&buf)))
            }
        }
    }

    fn read_item(&mut self) -> crate::Result<Item> {
        let entry = Entry::decode_from(&mut self.entries)?;

        let Some(key) = self.read_data(&entry.key)? else {
            return Err(crate::Error::Corrupted("entry without key"));
        };
        let value = self.read_data(&entry.value)?;

        Ok(Item { key, value })
    }
}

impl Iterator for LevelReader {
    type Item = crate::Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.is_failed {
            return None;
        }

        self.remaining -= 1;

        let item = self.read_item();
        self.is_failed = item.is_err();

        Some(item)
    }
}
