use strata::{Config, MemtableKind};
use test_log::test;

const MEMTABLE_CAPACITY: u64 = 4_096;

#[test]
fn memtable_reports_full() {
    let mut memtable = MemtableKind::Heap.create(MEMTABLE_CAPACITY);
    let value = [7; 16];

    let mut accepted = 0;

    for idx in 0..1_000 {
        if !memtable.set_string(&idx.to_string(), &value) {
            break;
        }
        accepted += 1;
    }

    assert!(accepted < 1_000);
    assert!(memtable.len() >= memtable.cap());
}

#[test]
fn store_thousand_keys_small_memtable() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;
    let value = [7; 16];

    {
        let store = Config::new(&folder)
            .memtable_capacity(MEMTABLE_CAPACITY)
            .open()?;

        for idx in 0..1_000 {
            store.set_string(&idx.to_string(), &value)?;
        }

        assert!(store.level_count() > 0);

        store.compact_and_sync()?;
        assert_eq!(0, store.memtable_size());

        store.close()?;
    }

    let store = Config::new(&folder)
        .memtable_capacity(MEMTABLE_CAPACITY)
        .open()?;

    let pairs = store.scan()?;

    let mut expected = (0..1_000).map(|idx| idx.to_string()).collect::<Vec<_>>();
    expected.sort();

    let keys = pairs
        .iter()
        .map(|(key, _)| String::from_utf8_lossy(key).to_string())
        .collect::<Vec<_>>();

    assert_eq!(expected, keys);
    assert!(pairs.iter().all(|(_, v)| &**v == value));

    for idx in [0, 1, 99, 500, 999] {
        assert_eq!(Some(&value[..]), store.get(idx.to_string())?.as_deref());
    }

    assert_eq!(None, store.get("1000")?);

    Ok(())
}
