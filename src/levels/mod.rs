// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod level;
pub mod reader;
pub mod writer;

use crate::file::{parse_level_file_name, remove_file_durably, TMP_SUFFIX};
use crate::Item;
use level::Level;
use std::{collections::BTreeMap, path::Path};

/// Sparse, ordered array of level slots
///
/// Slot 0 holds the most recently compacted data. Slots form a binary
/// counter: compaction fills the first empty slot with the merge of the
/// memtable and all levels in front of it.
pub struct Levels {
    slots: Vec<Option<Level>>,
}

impl std::fmt::Debug for Levels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.slots).finish()
    }
}

impl Levels {
    /// Discovers the level files in `folder`
    ///
    /// Leftover temporary files and values files without an entries file
    /// are remnants of an interrupted compaction and get deleted.
    pub fn recover<P: AsRef<Path>>(folder: P) -> crate::Result<Self> {
        let folder = folder.as_ref();
        log::debug!("Discovering levels in {}", folder.display());

        // index -> (has entries file, has values file)
        let mut found = BTreeMap::<usize, (bool, bool)>::new();

        for dirent in std::fs::read_dir(folder)? {
            let dirent = dirent?;

            if !dirent.file_type()?.is_file() {
                continue;
            }

            let file_name = dirent.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if file_name.ends_with(TMP_SUFFIX) {
                log::warn!("Deleting unfinished file {file_name:?}");
                remove_file_durably(&dirent.path())?;
                continue;
            }

            if let Some((index, is_entries)) = parse_level_file_name(file_name) {
                let slot = found.entry(index).or_default();

                if is_entries {
                    slot.0 = true;
                } else {
                    slot.1 = true;
                }
            }
        }

        let mut slots = Vec::new();

        for (index, files) in found {
            match files {
                (true, _) => {
                    let level = Level::open(folder, index)?;
                    log::debug!("Recovered {level:?}");

                    if slots.len() <= index {
                        slots.resize_with(index + 1, || None);
                    }

                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(level);
                    }
                }
                (false, _) => {
                    let path = crate::file::values_path(folder, index);
                    log::warn!("Deleting orphaned values file {}", path.display());
                    remove_file_durably(&path)?;
                }
            }
        }

        Ok(Self {
            slots,
        })
    }

    /// Slot the next compaction writes into: the first empty one
    pub fn target_slot(&self) -> usize {
        self.slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len())
    }

    /// Returns `true` if an occupied slot exists after `slot`
    pub fn has_older_than(&self, slot: usize) -> bool {
        self.slots.iter().skip(slot + 1).any(Option::is_some)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Occupied levels, newest first
    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.slots.iter().flatten()
    }

    /// Levels in front of `slot`, newest first
    pub fn front(&self, slot: usize) -> impl Iterator<Item = &Level> {
        self.slots.iter().take(slot).flatten()
    }

    /// Looks up `key` in priority order, stopping at the first hit
    pub fn get(&self, key: &[u8]) -> crate::Result<Option<Item>> {
        for level in self.iter() {
            if let Some(item) = level.get(key)? {
                return Ok(Some(item));
            }
        }

        Ok(None)
    }

    /// Puts a freshly written level into its slot
    ///
    /// Returns the levels in front of it, which it supersedes.
    pub fn install(&mut self, level: Level) -> Vec<Level> {
        let index = level.index();

        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }

        if let Some(slot) = self.slots.get_mut(index) {
            debug_assert!(slot.is_none(), "target slot should be empty");
            *slot = Some(level);
        }

        self.slots
            .iter_mut()
            .take(index)
            .filter_map(Option::take)
            .collect()
    }
}
