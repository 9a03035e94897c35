use strata::Config;
use test_log::test;

fn record(idx: usize) -> (String, Vec<u8>) {
    let key = format!("key-{idx:02}");

    let value = if idx % 2 == 0 {
        vec![idx as u8; 20]
    } else {
        vec![idx as u8; 5]
    };

    (key, value)
}

#[test]
fn store_recovers_complete_records_before_cut() -> strata::Result<()> {
    const RECORDS: usize = 8;

    let folder = tempfile::tempdir()?;

    {
        let store = Config::new(&folder).open()?;

        for idx in 0..RECORDS {
            let (key, value) = record(idx);
            store.set_string(&key, &value)?;
        }
    }

    let journal = std::fs::read(folder.path().join("wal"))?;

    // 32-byte entry, plus out-of-line value bytes for the even records
    let mut boundaries = vec![0];
    for idx in 0..RECORDS {
        let (_, value) = record(idx);
        let extra = if value.len() > 13 { value.len() } else { 0 };
        boundaries.push(boundaries.last().copied().unwrap_or_default() + 32 + extra);
    }
    assert_eq!(Some(&journal.len()), boundaries.last());

    for cut in 0..=journal.len() {
        let copy = tempfile::tempdir()?;
        std::fs::write(copy.path().join("wal"), &journal[..cut])?;

        let complete = boundaries.iter().filter(|b| **b <= cut).count() - 1;

        let store = Config::new(&copy).open()?;
        let pairs = store.scan()?;
        assert_eq!(complete, pairs.len(), "cut at {cut}");

        for (idx, (key, value)) in pairs.iter().enumerate() {
            let (expected_key, expected_value) = record(idx);
            assert_eq!(expected_key.as_bytes(), &**key);
            assert_eq!(expected_value, &**value);
        }

        drop(store);

        assert_eq!(
            boundaries[complete] as u64,
            std::fs::metadata(copy.path().join("wal"))?.len()
        );
    }

    Ok(())
}

#[test]
fn store_corrupted_journal_is_an_error() -> strata::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let store = Config::new(&folder).open()?;
        store.set_string("a", b"1")?;
        store.set_string("b", b"2")?;
    }

    let path = folder.path().join("wal");
    let mut journal = std::fs::read(&path)?;

    // Inline length of the second key, way past 13
    journal[33] = 200;
    std::fs::write(&path, &journal)?;

    assert!(matches!(
        Config::new(&folder).open(),
        Err(strata::Error::MalformedLength(_))
    ));

    Ok(())
}
