use std::sync::Arc;
use strata::{Config, PersistMode, Stats};
use test_log::test;

#[test]
fn store_recover_from_journal() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;
    let large_value = "a".repeat(60_000);

    {
        let store = Config::new(&folder).open()?;
        store.set_string("a", large_value.as_bytes())?;
        store.set_string("b", b"b")?;
        store.set_string("a-key-that-is-not-inline", b"c")?;
        store.remove("b")?;
        assert_eq!(0, store.level_count());
    }

    let stats = Arc::new(Stats::default());

    {
        let store = Config::new(&folder).stats(stats.clone()).open()?;
        assert_eq!(4, stats.records_recovered());
        assert_eq!(0, stats.compactions_completed());

        assert_eq!(Some(large_value.as_bytes()), store.get("a")?.as_deref());
        assert_eq!(None, store.get("b")?);
        assert_eq!(Some(&b"c"[..]), store.get("a-key-that-is-not-inline")?.as_deref());
        assert_eq!(2, store.scan()?.len());
    }

    Ok(())
}

#[test]
fn store_recover_levels_and_journal() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let store = Config::new(&folder).open()?;

        for idx in 0..100u32 {
            store.set_bytes(&idx.to_be_bytes(), b"old")?;
        }
        store.compact_and_sync()?;

        for idx in 50..150u32 {
            store.set_bytes(&idx.to_be_bytes(), b"new")?;
        }

        store.close()?;
    }

    let store = Config::new(&folder).open()?;
    assert_eq!(1, store.level_count());

    let pairs = store.scan()?;
    assert_eq!(150, pairs.len());

    for (idx, (key, value)) in pairs.iter().enumerate() {
        assert_eq!(&**key, (idx as u32).to_be_bytes());
        assert_eq!(if idx < 50 { &b"old"[..] } else { &b"new"[..] }, &**value);
    }

    Ok(())
}

#[test]
fn store_no_wal_loses_memtable() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let store = Config::new(&folder).no_wal(true).open()?;

        for idx in 0..10u32 {
            store.set_bytes(&idx.to_be_bytes(), b"durable")?;
        }
        store.compact_and_sync()?;

        for idx in 10..15u32 {
            store.set_bytes(&idx.to_be_bytes(), b"lost")?;
        }
    }

    assert!(!folder.path().join("wal").try_exists()?);

    let store = Config::new(&folder).no_wal(true).open()?;
    assert_eq!(10, store.scan()?.len());
    assert_eq!(None, store.get(12u32.to_be_bytes())?);

    Ok(())
}

#[test]
fn store_no_wal_compacts_stale_journal() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let store = Config::new(&folder).open()?;
        store.set_string("a", b"1")?;
        store.set_string("b", b"2")?;
    }

    {
        let store = Config::new(&folder).no_wal(true).open()?;
        assert_eq!(1, store.level_count());
        assert_eq!(0, store.memtable_size());
        assert!(!folder.path().join("wal").try_exists()?);
    }

    // The old journal must not be replayed on top of newer data
    {
        let store = Config::new(&folder).no_wal(true).open()?;
        store.set_string("a", b"3")?;
        store.compact_and_sync()?;
    }

    let store = Config::new(&folder).open()?;
    assert_eq!(Some(&b"3"[..]), store.get("a")?.as_deref());
    assert_eq!(Some(&b"2"[..]), store.get("b")?.as_deref());

    Ok(())
}

#[test]
fn store_no_wal_sync_buffers_until_persist() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;
    let stats = Arc::new(Stats::default());
    let wal = folder.path().join("wal");

    {
        let store = Config::new(&folder)
            .no_wal_sync(true)
            .stats(stats.clone())
            .open()?;

        store.set_string("a", b"1")?;
        assert_eq!(0, std::fs::metadata(&wal)?.len());
        assert_eq!(32, stats.journal_bytes_written());

        store.persist(PersistMode::SyncData)?;
        assert_eq!(32, std::fs::metadata(&wal)?.len());

        store.set_string("b", b"2")?;
    }

    // Dropping the store flushes the journal
    let store = Config::new(&folder).open()?;
    assert_eq!(2, store.scan()?.len());

    Ok(())
}

#[test]
fn store_compact_and_sync_empty_memtable() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;
    let stats = Arc::new(Stats::default());

    let store = Config::new(&folder).stats(stats.clone()).open()?;
    store.compact_and_sync()?;
    assert_eq!(0, store.level_count());
    assert_eq!(0, stats.compactions_completed());

    store.set_string("a", b"1")?;
    store.compact_and_sync()?;
    assert_eq!(1, store.level_count());
    assert_eq!(1, stats.compactions_completed());
    assert!(stats.level_bytes_written() >= 32);
    assert_eq!(0, std::fs::metadata(folder.path().join("wal"))?.len());

    Ok(())
}
