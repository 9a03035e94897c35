// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    file::{entries_path, fsync_directory, tmp_path, values_path},
    levels::{
        level::Level,
        writer::{Metadata, Writer},
        Levels,
    },
    memtable::Memtable,
    merge::{BoxedSource, MergeIterator},
};
use std::{path::Path, time::Instant};

/// Result of a compaction
#[derive(Debug)]
pub struct CompactionResult {
    /// Slot the new level was installed into
    pub target: usize,

    /// What was written
    pub meta: Metadata,

    /// Number of levels that were merged and deleted
    pub superseded: usize,
}

/// Deletes whatever a failed compaction left behind, entries file first
fn remove_unfinished(paths: [&Path; 4]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!("Failed to remove {}: {e:?}", path.display());
            }
        }
    }
}

fn write_merged(
    memtable: &dyn Memtable,
    levels: &Levels,
    target: usize,
    entries_tmp: &Path,
    values_tmp: &Path,
) -> crate::Result<Metadata> {
    let mut sources: Vec<BoxedSource<'_>> = memtable.iters();

    for level in levels.front(target) {
        sources.push(Box::new(level.iter()?));
    }

    // NOTE: Nothing older exists, so there is nothing left for a tombstone to shadow
    let evict_tombstones = !levels.has_older_than(target);

    log::trace!(
        "Merging {} sources into slot {target}, evict_tombstones={evict_tombstones}",
        sources.len(),
    );

    let mut writer = Writer::new(entries_tmp, values_tmp, evict_tombstones)?;

    for item in MergeIterator::new(sources) {
        let (item, _) = item?;
        writer.write(&item)?;
    }

    writer.finish()
}

/// Writes the merged level to temporary files, then renames both into place
fn write_level(
    folder: &Path,
    memtable: &dyn Memtable,
    levels: &Levels,
    target: usize,
    [entries_path, values_path]: [&Path; 2],
    [entries_tmp, values_tmp]: [&Path; 2],
) -> crate::Result<(Metadata, Level)> {
    let meta = write_merged(memtable, levels, target, entries_tmp, values_tmp)?;

    // IMPORTANT: Values file first, an entries file must never exist without its values
    std::fs::rename(values_tmp, values_path).inspect_err(|e| {
        log::error!("Failed to rename {}: {e:?}", values_tmp.display());
    })?;
    fsync_directory(folder)?;

    std::fs::rename(entries_tmp, entries_path).inspect_err(|e| {
        log::error!("Failed to rename {}: {e:?}", entries_tmp.display());
    })?;
    fsync_directory(folder)?;

    Ok((meta, Level::open(folder, target)?))
}

/// Merges the memtable and the levels in front of the first empty slot into
/// a new level pair in that slot, then deletes the merged levels
///
/// The new pair is written to temporary files, made durable, and renamed
/// into place: values file first, then the entries file, each rename
/// followed by a directory fsync. The memtable and journal are left alone.
pub fn compact(
    folder: &Path,
    memtable: &dyn Memtable,
    levels: &mut Levels,
    max_levels: usize,
) -> crate::Result<CompactionResult> {
    let target = levels.target_slot();

    if target >= max_levels {
        log::error!("Compaction needs slot {target}, but only {max_levels} levels are allowed");
        return Err(crate::Error::TooManyLevels(target));
    }

    let start = Instant::now();

    log::debug!(
        "Compacting memtable ({} keys, {}B) and {} levels into slot {target}",
        memtable.key_count(),
        memtable.len(),
        levels.front(target).count(),
    );

    let entries_path = entries_path(folder, target);
    let values_path = values_path(folder, target);
    let entries_tmp = tmp_path(&entries_path);
    let values_tmp = tmp_path(&values_path);

    let (meta, level) = match write_level(
        folder,
        memtable,
        levels,
        target,
        [&entries_path, &values_path],
        [&entries_tmp, &values_tmp],
    ) {
        Ok(written) => written,
        Err(e) => {
            log::error!("Compaction into slot {target} failed: {e:?}");
            remove_unfinished([&entries_path, &entries_tmp, &values_path, &values_tmp]);
            return Err(e);
        }
    };

    let superseded = levels.install(level);
    let superseded_count = superseded.len();

    for level in superseded {
        level.remove()?;
    }

    log::debug!(
        "Compaction into slot {target} done in {}ms: {} items ({}B + {}B), {} tombstones evicted, {superseded_count} levels merged",
        start.elapsed().as_millis(),
        meta.item_count,
        meta.entries_bytes,
        meta.values_bytes,
        meta.evicted_tombstones,
    );

    Ok(CompactionResult {
        target,
        meta,
        superseded: superseded_count,
    })
}
