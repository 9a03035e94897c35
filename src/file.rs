// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    fs::File,
    path::{Path, PathBuf},
};

pub const JOURNAL_FILE: &str = "wal";
pub const ENTRIES_SUFFIX: &str = "-entries.sst";
pub const VALUES_SUFFIX: &str = "-values.dat";
pub const TMP_SUFFIX: &str = ".tmp";

/// Path of the entries file of the level in slot `index`
pub fn entries_path(folder: &Path, index: usize) -> PathBuf {
    folder.join(format!("{index:04}{ENTRIES_SUFFIX}"))
}

/// Path of the values file of the level in slot `index`
pub fn values_path(folder: &Path, index: usize) -> PathBuf {
    folder.join(format!("{index:04}{VALUES_SUFFIX}"))
}

/// Path a file is written to before it is renamed into place
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut path = path.as_os_str().to_owned();
    path.push(TMP_SUFFIX);
    path.into()
}

/// Parses a level file name into its slot index and whether it is the entries file
pub fn parse_level_file_name(name: &str) -> Option<(usize, bool)> {
    let (index, is_entries) = if let Some(index) = name.strip_suffix(ENTRIES_SUFFIX) {
        (index, true)
    } else {
        (name.strip_suffix(VALUES_SUFFIX)?, false)
    };

    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    index.parse().ok().map(|index| (index, is_entries))
}

#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

#[cfg(target_os = "windows")]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    let _ = path;
    Ok(())
}

/// Removes a file, then fsyncs its parent folder
pub fn remove_file_durably(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path).inspect_err(|e| {
        log::error!("Failed to remove {}: {e:?}", path.display());
    })?;

    if let Some(folder) = path.parent() {
        fsync_directory(folder)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn level_file_names() {
        let folder = Path::new("/store");

        assert_eq!(
            Path::new("/store/0003-entries.sst"),
            entries_path(folder, 3)
        );
        assert_eq!(Path::new("/store/0012-values.dat"), values_path(folder, 12));
        assert_eq!(
            Path::new("/store/0003-entries.sst.tmp"),
            tmp_path(&entries_path(folder, 3))
        );

        assert_eq!(Some((3, true)), parse_level_file_name("0003-entries.sst"));
        assert_eq!(Some((12, false)), parse_level_file_name("0012-values.dat"));
        assert_eq!(Some((10_000, true)), parse_level_file_name("10000-entries.sst"));
        assert_eq!(None, parse_level_file_name("0003-entries.sst.tmp"));
        assert_eq!(None, parse_level_file_name("-entries.sst"));
        assert_eq!(None, parse_level_file_name("+1-values.dat"));
        assert_eq!(None, parse_level_file_name("wal"));
    }

    #[test]
    fn fsync_folder() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        fsync_directory(dir.path())?;

        let path = dir.path().join("file");
        std::fs::write(&path, b"abc")?;
        remove_file_durably(&path)?;
        assert!(!path.try_exists()?);

        Ok(())
    }
}
