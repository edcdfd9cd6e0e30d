//! Crash-recovery tests for the memory store
//!
//! Reopening a store must yield the state produced by loading the
//! snapshot and then replaying the WAL on top of it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use ferrokv::{MemoryStore, MemoryStoreOptions, MockClock, Store};

// =============================================================================
// Helper Functions
// =============================================================================

fn options(dir: &Path, clock: Arc<MockClock>, snapshot_threshold: usize) -> MemoryStoreOptions {
    MemoryStoreOptions {
        wal_path: Some(dir.join("data.wal")),
        snapshot_path: Some(dir.join("data.snap")),
        snapshot_threshold,
        clock,
    }
}

// =============================================================================
// WAL-only Recovery
// =============================================================================

#[test]
fn test_wal_recovery_replays_mutations_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        store.remove(b"a").unwrap();
        store.put(b"c", b"3").unwrap();
    }

    let store = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(b"a").unwrap(), None);
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn test_clear_is_recovered() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        store.put(b"a", b"1").unwrap();
        store.clear().unwrap();
        store.put(b"b", b"2").unwrap();
    }

    let store = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_recovery_equals_fresh_application() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();

    // the same mutation sequence applied to a fresh volatile store
    let reference = MemoryStore::new();
    let mutations: Vec<(&[u8], Option<&[u8]>)> = vec![
        (b"x", Some(b"1")),
        (b"y", Some(b"2")),
        (b"x", Some(b"3")),
        (b"y", None),
        (b"z", Some(b"4")),
    ];

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        for (key, value) in &mutations {
            match value {
                Some(v) => {
                    store.put(key, v).unwrap();
                    reference.put(key, v).unwrap();
                }
                None => {
                    store.remove(key).unwrap();
                    reference.remove(key).unwrap();
                }
            }
        }
    }

    let recovered = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    assert_eq!(recovered.len(), reference.len());
    for key in [b"x".as_slice(), b"y", b"z"] {
        assert_eq!(recovered.get(key).unwrap(), reference.get(key).unwrap());
    }
}

// =============================================================================
// Snapshot + WAL Recovery
// =============================================================================

#[test]
fn test_snapshot_plus_wal_recovery() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();
    let wal_path = temp_dir.path().join("data.wal");
    let snap_path = temp_dir.path().join("data.snap");

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();

        let wal_size_before = std::fs::metadata(&wal_path).unwrap().len();
        store.snapshot().unwrap();
        assert!(std::fs::metadata(&snap_path).unwrap().len() > 0);
        assert!(std::fs::metadata(&wal_path).unwrap().len() < wal_size_before);

        store.put(b"a", b"updated").unwrap();
        store.put(b"c", b"3").unwrap();
    }

    let store = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.get(b"a").unwrap(), Some(b"updated".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn test_auto_snapshot_at_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();
    let snap_path = temp_dir.path().join("data.snap");

    {
        let store = MemoryStore::open(options(temp_dir.path(), clock.clone(), 5)).unwrap();
        for i in 0..10u32 {
            store.put(format!("key{}", i).as_bytes(), b"v").unwrap();
        }
        assert!(snap_path.exists());
    }

    let store = MemoryStore::open(options(temp_dir.path(), clock, 5)).unwrap();
    assert_eq!(store.len(), 10);
}

#[test]
fn test_wal_truncated_after_explicit_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();
    let wal_path = temp_dir.path().join("data.wal");

    let store = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    for i in 0..50u32 {
        store.put(format!("key{}", i).as_bytes(), b"value").unwrap();
    }
    store.snapshot().unwrap();

    // header only
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 8);
}

// =============================================================================
// TTL Across Restart
// =============================================================================

#[test]
fn test_ttl_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();
    clock.set(1_000);

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        store
            .put_with_ttl(b"key", b"value", Duration::from_millis(5_000))
            .unwrap();
    }

    let store = MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
    assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));

    clock.advance(Duration::from_millis(6_000));
    assert_eq!(store.get(b"key").unwrap(), None);
}

#[test]
fn test_entries_expired_at_load_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        store
            .put_with_ttl(b"gone", b"v", Duration::from_millis(100))
            .unwrap();
        store.put(b"stays", b"v").unwrap();
    }

    clock.advance(Duration::from_millis(10_000));
    let store = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(!store.contains(b"gone").unwrap());
    assert!(store.contains(b"stays").unwrap());
}

#[test]
fn test_snapshotted_ttl_expired_at_load_is_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let clock = MockClock::new();

    {
        let store =
            MemoryStore::open(options(temp_dir.path(), clock.clone(), 100_000)).unwrap();
        store
            .put_with_ttl(b"gone", b"v", Duration::from_millis(100))
            .unwrap();
        store.put(b"stays", b"v").unwrap();
        store.snapshot().unwrap();
    }

    clock.advance(Duration::from_millis(10_000));
    let store = MemoryStore::open(options(temp_dir.path(), clock, 100_000)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.contains(b"stays").unwrap());
}
