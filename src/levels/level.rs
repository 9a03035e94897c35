// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::reader::LevelReader;
use crate::{
    entry::ENTRY_SIZE,
    file::{entries_path, fsync_directory, values_path},
    inline_ptr::{prefix_of, InlinePtr},
    Entry, Item, Slice,
};
use std::{
    cmp::Ordering,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// Immutable, sorted level file pair
///
/// The entries file is an array of fixed-size entry records, ordered by key;
/// the values file holds the out-of-line key and value bytes they point to.
pub struct Level {
    index: usize,
    entries_path: PathBuf,
    values_path: PathBuf,
    entries: File,
    values: File,
    item_count: u64,
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Level:{}({} items)", self.index, self.item_count)
    }
}

impl Level {
    /// Opens the level pair in slot `index` of `folder`
    pub fn open(folder: &Path, index: usize) -> crate::Result<Self> {
        let entries_path = entries_path(folder, index);
        let values_path = values_path(folder, index);

        if !values_path.try_exists()? {
            log::error!("Level {index} has no values file at {}", values_path.display());
            return Err(crate::Error::Corrupted("entries file without values file"));
        }

        let entries = File::open(&entries_path).inspect_err(|e| {
            log::error!("Failed to open {}: {e:?}", entries_path.display());
        })?;
        let values = File::open(&values_path).inspect_err(|e| {
            log::error!("Failed to open {}: {e:?}", values_path.display());
        })?;

        let len = entries.metadata()?.len();

        if len % ENTRY_SIZE as u64 != 0 {
            log::error!(
                "Entries file {} has a partial record ({len}B)",
                entries_path.display()
            );
            return Err(crate::Error::Corrupted("partial entry record"));
        }

        Ok(Self {
            index,
            entries_path,
            values_path,
            entries,
            values,
            item_count: len / ENTRY_SIZE as u64,
        })
    }

    /// Slot of this level
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of entries, tombstones included
    #[cfg(test)]
    pub fn len(&self) -> u64 {
        self.item_count
    }

    /// Streams every item in key order
    pub fn iter(&self) -> crate::Result<LevelReader> {
        LevelReader::new(&self.entries_path, &self.values_path)
    }

    fn entry_at(&self, idx: u64) -> crate::Result<Entry> {
        let mut file = &self.entries;
        file.seek(SeekFrom::Start(idx * ENTRY_SIZE as u64))?;
        Entry::decode_from(&mut file)
    }

    fn read_data(&self, ptr: &InlinePtr) -> crate::Result<Option<Slice>> {
        match ptr {
            InlinePtr::Null => Ok(None),
            InlinePtr::Inline { .. } => Ok(ptr.inline_data().map(Slice::new)),
            InlinePtr::Pointer { len, offset, .. } => {
                let mut file = &self.values;
                file.seek(SeekFrom::Start(*offset))?;

                let mut buf = vec![0; usize::from(*len)];
                file.read_exact(&mut buf).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        crate::Error::InvalidPointer {
                            offset: *offset,
                            len: *len,
                        }
                    } else {
                        e.into()
                    }
                })?;

                Ok(Some(Slice::new(&buf)))
            }
        }
    }

    /// Binary searches the entries file for `key`
    ///
    /// Key bytes are only read from the values file when prefixes are equal.
    /// Returns the stored item, which may be a tombstone.
    pub fn get(&self, key: &[u8]) -> crate::Result<Option<Item>> {
        let prefix = prefix_of(key);

        let mut lo = 0;
        let mut hi = self.item_count;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.entry_at(mid)?;

            let ord = match entry.key.prefix().cmp(&prefix) {
                Ordering::Equal => {
                    let Some(stored) = self.read_data(&entry.key)? else {
                        return Err(crate::Error::Corrupted("entry without key"));
                    };
                    (*stored).cmp(key)
                }
                other => other,
            };

            match ord {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    let value = self.read_data(&entry.value)?;

                    return Ok(Some(Item {
                        key: Slice::new(key),
                        value,
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Deletes the level files, entries file first
    ///
    /// A crash in between leaves a values file without entries file,
    /// which is cleaned up on the next open.
    pub fn remove(self) -> crate::Result<()> {
        log::trace!("Removing level {} at {:?}", self.index, self.entries_path);

        let Self {
            entries_path,
            values_path,
            entries,
            values,
            ..
        } = self;

        drop(entries);
        drop(values);

        std::fs::remove_file(&entries_path).inspect_err(|e| {
            log::error!("Failed to remove {}: {e:?}", entries_path.display());
        })?;
        std::fs::remove_file(&values_path).inspect_err(|e| {
            log::error!("Failed to remove {}: {e:?}", values_path.display());
        })?;

        if let Some(folder) = entries_path.parent() {
            fsync_directory(folder)?;
        }

        Ok(())
    }
}
