//! Benchmarks for FerroKV storage backends

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use ferrokv::{DiskStore, DiskStoreOptions, MemoryStore, MemoryStoreOptions, Store};

fn memory_store_benchmarks(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::open(MemoryStoreOptions {
        wal_path: Some(temp_dir.path().join("bench.wal")),
        snapshot_path: Some(temp_dir.path().join("bench.snap")),
        ..MemoryStoreOptions::default()
    })
    .unwrap();

    let mut i: u64 = 0;
    c.bench_function("memory_put", |b| {
        b.iter(|| {
            let key = format!("key{}", i % 10_000);
            store.put(key.as_bytes(), b"value").unwrap();
            i += 1;
        })
    });

    store.put(b"hot", b"value").unwrap();
    c.bench_function("memory_get", |b| {
        b.iter(|| store.get(b"hot").unwrap())
    });
}

fn disk_store_benchmarks(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskStore::open(DiskStoreOptions {
        data_dir: temp_dir.path().to_path_buf(),
        ..DiskStoreOptions::default()
    })
    .unwrap();

    let mut i: u64 = 0;
    c.bench_function("disk_put", |b| {
        b.iter(|| {
            let key = format!("key{}", i % 10_000);
            store.put(key.as_bytes(), b"value").unwrap();
            i += 1;
        })
    });

    store.put(b"hot", b"value").unwrap();
    c.bench_function("disk_get", |b| {
        b.iter(|| store.get(b"hot").unwrap())
    });
}

criterion_group!(benches, memory_store_benchmarks, disk_store_benchmarks);
criterion_main!(benches);
