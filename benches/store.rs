use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use strata::Config;
use tempfile::tempdir;

fn store_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("store write");

    for &size in &[1_000u32, 10_000] {
        group.throughput(Throughput::Elements(u64::from(size)));

        group.bench_with_input(BenchmarkId::new("no_wal_sync", size), &size, |b, &size| {
            b.iter(|| {
                let folder = tempdir().unwrap();
                let store = Config::new(&folder)
                    .memtable_capacity(64 * 1_024)
                    .no_wal_sync(true)
                    .open()
                    .unwrap();

                for idx in 0..size {
                    store
                        .set_bytes(black_box(&idx.to_be_bytes()), black_box(b"value"))
                        .unwrap();
                }

                store.compact_and_sync().unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("no_wal", size), &size, |b, &size| {
            b.iter(|| {
                let folder = tempdir().unwrap();
                let store = Config::new(&folder)
                    .memtable_capacity(64 * 1_024)
                    .no_wal(true)
                    .open()
                    .unwrap();

                for idx in 0..size {
                    store
                        .set_bytes(black_box(&idx.to_be_bytes()), black_box(b"value"))
                        .unwrap();
                }

                store.compact_and_sync().unwrap();
            });
        });
    }

    group.finish();
}

fn store_point_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("store point read");

    let folder = tempdir().unwrap();
    let store = Config::new(&folder)
        .memtable_capacity(64 * 1_024)
        .no_wal_sync(true)
        .open()
        .unwrap();

    for idx in 0..100_000u32 {
        store.set_bytes(&idx.to_be_bytes(), b"value").unwrap();
    }
    store.compact_and_sync().unwrap();

    group.bench_function("levels", |b| {
        let mut idx = 0u32;

        b.iter(|| {
            idx = (idx + 7_919) % 100_000;
            black_box(store.get(idx.to_be_bytes()).unwrap());
        });
    });

    group.finish();
}

fn store_scan(c: &mut Criterion) {
    let folder = tempdir().unwrap();
    let store = Config::new(&folder)
        .memtable_capacity(64 * 1_024)
        .no_wal_sync(true)
        .open()
        .unwrap();

    for idx in 0..10_000u32 {
        store.set_bytes(&idx.to_be_bytes(), b"value").unwrap();
    }

    c.bench_function("store scan 10K", |b| {
        b.iter(|| black_box(store.scan().unwrap().len()));
    });
}

criterion_group!(benches, store_write, store_point_read, store_scan);
criterion_main!(benches);
