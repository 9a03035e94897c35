// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::reader::JournalReader;
use crate::Item;
use std::{fs::OpenOptions, path::Path};

#[derive(Debug, Default, Eq, PartialEq)]
pub struct RecoveryResult {
    /// Number of records replayed
    pub records: usize,

    /// Bytes of complete records, the journal length after recovery
    pub consumed: u64,

    /// Bytes of a partial trailing record that were cut off
    pub discarded: u64,
}

/// Replays every complete record of the journal at `path` through `apply`
///
/// A partial trailing record is the remainder of an interrupted write:
/// the journal is truncated to the last complete record and fsynced.
pub fn recover_journal<P, F>(path: P, mut apply: F) -> crate::Result<RecoveryResult>
where
    P: AsRef<Path>,
    F: FnMut(Item) -> crate::Result<()>,
{
    let path = path.as_ref();

    if !path.try_exists()? {
        log::trace!("No journal at {}, nothing to recover", path.display());
        return Ok(RecoveryResult::default());
    }

    let mut reader = JournalReader::new(path).inspect_err(|e| {
        log::error!("Failed to open journal at {}: {e:?}", path.display());
    })?;

    let mut records = 0;

    for item in &mut reader {
        apply(item?)?;
        records += 1;
    }

    let consumed = reader.consumed();
    let mut discarded = 0;

    if reader.is_truncated() {
        let file = OpenOptions::new().write(true).open(path)?;
        let len = file.metadata()?.len();
        discarded = len - consumed;

        log::warn!(
            "Journal {} ends in a partial record, discarding {discarded} trailing bytes",
            path.display(),
        );

        file.set_len(consumed)?;
        file.sync_all()?;
    }

    log::debug!(
        "Recovered {records} journal records ({consumed}B) from {}",
        path.display(),
    );

    Ok(RecoveryResult {
        records,
        consumed,
        discarded,
    })
}
