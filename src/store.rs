// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    compaction::compact,
    file::{fsync_directory, remove_file_durably, JOURNAL_FILE},
    journal::Journal,
    levels::Levels,
    memtable::{InsertOutcome, Memtable},
    merge::{BoxedSource, MergeIterator},
    path::absolute_path,
    value::MAX_DATA_LEN,
    Config, KvPair, PersistMode, UserValue,
};
use std::{
    path::PathBuf,
    sync::{atomic::Ordering::Relaxed, Mutex, MutexGuard},
    time::Instant,
};

struct StoreInner {
    config: Config,
    memtable: Box<dyn Memtable>,
    journal: Option<Journal>,
    levels: Levels,

    /// Set once a journal write fails
    ///
    /// The journal may end in a partial record then, which would sit in
    /// the middle of the journal after any further write.
    is_poisoned: bool,
}

impl StoreInner {
    fn log(&mut self, key: &[u8], value: Option<&[u8]>) -> crate::Result<()> {
        if self.is_poisoned {
            return Err(crate::Error::Poisoned);
        }

        if let Some(journal) = &mut self.journal {
            let bytes = journal.write(key, value).inspect_err(|_| {
                log::error!("Poisoning store because of a failed journal write");
                self.is_poisoned = true;
            })?;

            if let Some(stats) = &self.config.stats {
                stats.journal_bytes_written.fetch_add(bytes as u64, Relaxed);
            }
        }

        Ok(())
    }

    /// Applies a mutation to the memtable, compacting when it fills up
    ///
    /// Returns `true` if a compaction ran.
    fn apply(&mut self, key: &[u8], value: Option<&[u8]>, log: bool) -> crate::Result<bool> {
        if log {
            self.log(key, value)?;
        }

        match self.memtable.insert(key, value) {
            InsertOutcome::Stored => Ok(false),
            InsertOutcome::Full => {
                self.compact()?;
                Ok(true)
            }
            InsertOutcome::Rejected => {
                log::debug!("Memtable rejected insert, compacting before retry");

                // NOTE: The compaction truncates the journal, so the record is logged again
                self.compact()?;
                self.apply(key, value, log)?;

                Ok(true)
            }
        }
    }

    fn truncate_journal(&mut self) -> crate::Result<()> {
        if let Some(journal) = &mut self.journal {
            journal.truncate()?;
        }

        // IMPORTANT: fsync folder on Unix
        fsync_directory(&self.config.path)?;

        Ok(())
    }

    /// Compacts the memtable into a new level, then truncates the journal
    /// and resets the memtable
    fn compact(&mut self) -> crate::Result<()> {
        let start = Instant::now();

        let result = compact(
            &self.config.path,
            &*self.memtable,
            &mut self.levels,
            self.config.max_levels,
        )?;

        self.truncate_journal()?;
        self.memtable.reset();

        log::trace!(
            "Installed level in slot {}, {} levels superseded, now {} levels",
            result.target,
            result.superseded,
            self.levels.len(),
        );

        if let Some(stats) = &self.config.stats {
            stats.compactions_completed.fetch_add(1, Relaxed);
            stats.level_bytes_written.fetch_add(
                result.meta.entries_bytes + result.meta.values_bytes,
                Relaxed,
            );

            // NOTE: Truncation is fine, no compaction takes 584 thousand years
            #[allow(clippy::cast_possible_truncation)]
            let micros = start.elapsed().as_micros() as u64;
            stats.time_compacting.fetch_add(micros, Relaxed);
        }

        Ok(())
    }

    fn sources(&self) -> crate::Result<Vec<BoxedSource<'_>>> {
        let mut sources = self.memtable.iters();

        for level in self.levels.iter() {
            sources.push(Box::new(level.iter()?));
        }

        Ok(sources)
    }
}

/// An embedded, ordered key-value store
///
/// Writes go to the journal, then into the memtable. Once the memtable is
/// full, it is compacted into immutable level files, and the journal is
/// truncated.
///
/// All operations are serialized by a single lock, so a store can be
/// shared between threads.
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Store({})", self.lock().config.path.display())
    }
}

impl Store {
    /// Opens a store, recovering levels and the journal
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or existing data is corrupted.
    pub fn open(config: Config) -> crate::Result<Self> {
        let memtable = config
            .memtable_kind
            .create(config.memtable_capacity);

        Self::open_with_memtable(config, memtable)
    }

    pub(crate) fn open_with_memtable(
        mut config: Config,
        memtable: Box<dyn Memtable>,
    ) -> crate::Result<Self> {
        config.path = absolute_path(&config.path)?;
        let path = config.path.clone();

        log::debug!("Opening store at {}", path.display());

        std::fs::create_dir_all(&path).inspect_err(|e| {
            log::error!("Failed to create store folder at {}: {e:?}", path.display());
        })?;

        let levels = Levels::recover(&path)?;
        let journal_path = path.join(JOURNAL_FILE);

        let mut inner = StoreInner {
            config,
            memtable,
            journal: None,
            levels,
            is_poisoned: false,
        };

        let mut compacted_during_replay = false;

        let recovered = Journal::recover(&journal_path, |item| {
            // NOTE: The journal is not truncated by these compactions, it is
            // only dropped once replay is complete
            compacted_during_replay |= inner.apply(&item.key, item.value.as_deref(), false)?;
            Ok(())
        })?;

        if let Some(stats) = &inner.config.stats {
            stats.records_recovered.fetch_add(recovered.records, Relaxed);
        }

        if inner.config.no_wal {
            if recovered.records > 0 && !inner.memtable.is_empty() {
                inner.compact()?;
            }

            if journal_path.try_exists()? {
                log::debug!("Journal is disabled, removing {}", journal_path.display());
                remove_file_durably(&journal_path)?;
            }
        } else {
            inner.journal = Some(Journal::open(&journal_path, !inner.config.no_wal_sync)?);

            if compacted_during_replay {
                if inner.memtable.is_empty() {
                    inner.truncate_journal()?;
                } else {
                    inner.compact()?;
                }
            }

            fsync_directory(&path)?;
        }

        log::debug!(
            "Opened store at {}: {} levels, {} keys recovered into memtable",
            path.display(),
            inner.levels.len(),
            inner.memtable.key_count(),
        );

        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        #[allow(clippy::expect_used)]
        self.inner.lock().expect("lock is poisoned")
    }

    fn check_key(key: &[u8]) -> crate::Result<()> {
        if key.len() > MAX_DATA_LEN {
            return Err(crate::Error::KeyTooLarge(key.len()));
        }

        Ok(())
    }

    /// Inserts a key-value pair, compacting if the memtable is full
    ///
    /// # Errors
    ///
    /// Will return `Err` if the key or value is larger than 65535 bytes,
    /// or an IO error occurs. A journal error poisons the store: the mutation
    /// is not applied, and every later write returns [`crate::Error::Poisoned`].
    pub fn set_bytes(&self, key: &[u8], value: &[u8]) -> crate::Result<()> {
        Self::check_key(key)?;

        if value.len() > MAX_DATA_LEN {
            return Err(crate::Error::ValueTooLarge(value.len()));
        }

        self.lock().apply(key, Some(value), true).map(|_| ())
    }

    /// Inserts a key-value pair, see [`Store::set_bytes`]
    ///
    /// # Errors
    ///
    /// Will return `Err` if the key or value is larger than 65535 bytes,
    /// or an IO error occurs.
    pub fn set_string(&self, key: &str, value: &[u8]) -> crate::Result<()> {
        self.set_bytes(key.as_bytes(), value)
    }

    /// Removes a key by writing a tombstone for it
    ///
    /// # Errors
    ///
    /// Will return `Err` if the key is larger than 65535 bytes, or an IO error occurs.
    pub fn remove<K: AsRef<[u8]>>(&self, key: K) -> crate::Result<()> {
        let key = key.as_ref();
        Self::check_key(key)?;

        self.lock().apply(key, None, true).map(|_| ())
    }

    /// Retrieves the value of a key
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or a level is corrupted.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> crate::Result<Option<UserValue>> {
        let key = key.as_ref();
        let inner = self.lock();

        if let Some(item) = inner.memtable.get(key) {
            return Ok(item.value);
        }

        Ok(inner.levels.get(key)?.and_then(|item| item.value))
    }

    /// Returns `true` if the store contains the key
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or a level is corrupted.
    pub fn contains_key<K: AsRef<[u8]>>(&self, key: K) -> crate::Result<bool> {
        self.get(key).map(|x| x.is_some())
    }

    /// Returns every live key-value pair, in ascending key order
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or a level is corrupted.
    pub fn scan(&self) -> crate::Result<Vec<KvPair>> {
        let inner = self.lock();
        let mut pairs = Vec::new();

        for item in MergeIterator::new(inner.sources()?) {
            let (item, _) = item?;

            if let Some(pair) = item.into_pair() {
                pairs.push(pair);
            }
        }

        Ok(pairs)
    }

    /// Compacts the memtable into a new level and truncates the journal
    ///
    /// If the memtable is empty, the journal is synced instead.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or there are too many levels.
    pub fn compact_and_sync(&self) -> crate::Result<()> {
        let mut inner = self.lock();

        if inner.memtable.is_empty() {
            if let Some(journal) = &mut inner.journal {
                journal.persist(PersistMode::SyncAll)?;
            }

            return Ok(());
        }

        inner.compact()
    }

    /// Persists buffered journal writes
    ///
    /// Only needed when journal syncing is disabled, see [`Config::no_wal_sync`].
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn persist(&self, mode: PersistMode) -> crate::Result<()> {
        if let Some(journal) = &mut self.lock().journal {
            journal.persist(mode)?;
        }

        Ok(())
    }

    /// Number of occupied level slots
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.lock().levels.len()
    }

    /// Accounted memtable size in bytes
    #[must_use]
    pub fn memtable_size(&self) -> u64 {
        self.lock().memtable.len()
    }

    /// Store folder
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.lock().config.path.clone()
    }

    /// Syncs the journal and closes all files
    ///
    /// Data in the memtable stays in the journal and is recovered on the next open.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn close(self) -> crate::Result<()> {
        let mut inner = self.lock();

        log::debug!("Closing store at {}", inner.config.path.display());

        if let Some(journal) = &mut inner.journal {
            journal.persist(PersistMode::SyncAll)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memtable::SkipMemtable;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    fn store_retries_rejected_insert() -> crate::Result<()> {
        let folder = tempdir()?;

        let store = Store::open_with_memtable(
            Config::new(&folder),
            Box::new(SkipMemtable::with_node_capacity(u64::MAX, 4)),
        )?;

        for idx in 0..10u32 {
            store.set_string(&format!("{idx}"), b"v")?;
        }

        // 4 + 4 keys went into levels, the last 2 are in the memtable
        assert_eq!(1, store.level_count());
        assert_eq!(2 * 32, store.memtable_size());
        assert_eq!(
            2 * 32,
            std::fs::metadata(folder.path().join(JOURNAL_FILE))?.len()
        );
        assert_eq!(10, store.scan()?.len());

        Ok(())
    }

    #[test]
    fn store_replay_compacts_when_memtable_overflows() -> crate::Result<()> {
        let folder = tempdir()?;

        {
            let store = Config::new(&folder).open()?;
            for idx in 0..100u32 {
                store.set_string(&format!("{idx:03}"), b"value")?;
            }
            assert_eq!(0, store.level_count());
        }

        let stats = std::sync::Arc::new(crate::Stats::default());

        let store = Config::new(&folder)
            .memtable_capacity(32 * 30)
            .stats(stats.clone())
            .open()?;

        assert_eq!(100, stats.records_recovered());
        assert!(stats.compactions_completed() >= 3);
        assert_eq!(0, store.memtable_size());
        assert_eq!(0, std::fs::metadata(folder.path().join(JOURNAL_FILE))?.len());
        assert_eq!(100, store.scan()?.len());

        Ok(())
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn store_poisoned_after_journal_failure() -> crate::Result<()> {
        let folder = tempdir()?;
        let store = Config::new(&folder).open()?;

        store.set_string("a", b"1")?;

        // Every flush to this device fails with ENOSPC
        store.lock().journal = Some(Journal::open("/dev/full", true)?);

        assert!(matches!(store.set_string("b", b"2"), Err(crate::Error::Io(_))));
        assert!(matches!(store.set_string("c", b"3"), Err(crate::Error::Poisoned)));
        assert!(matches!(store.remove("a"), Err(crate::Error::Poisoned)));

        // Reads still work, the failed write never reached the memtable
        assert_eq!(Some(&b"1"[..]), store.get("a")?.as_deref());
        assert_eq!(None, store.get("b")?);

        Ok(())
    }

    #[test]
    fn store_path_is_normalized() -> crate::Result<()> {
        let folder = tempdir()?;

        let store = Config::new(folder.path().join("a").join("..").join("b")).open()?;
        assert_eq!(folder.path().join("b"), store.path());
        assert!(store.path().join(JOURNAL_FILE).try_exists()?);

        Ok(())
    }

    #[test]
    fn store_rejects_oversized_input() -> crate::Result<()> {
        let folder = tempdir()?;
        let store = Config::new(&folder).open()?;

        let large = vec![0; MAX_DATA_LEN + 1];

        assert!(matches!(
            store.set_bytes(&large, b"v"),
            Err(crate::Error::KeyTooLarge(_))
        ));
        assert!(matches!(
            store.set_bytes(b"k", &large),
            Err(crate::Error::ValueTooLarge(_))
        ));
        assert!(matches!(
            store.remove(&large),
            Err(crate::Error::KeyTooLarge(_))
        ));

        // Nothing reached the journal
        assert_eq!(0, std::fs::metadata(folder.path().join(JOURNAL_FILE))?.len());

        store.set_bytes(&large[1..], &large[1..])?;
        assert_eq!(Some(MAX_DATA_LEN), store.get(&large[1..])?.map(|v| v.len()));

        Ok(())
    }
}
