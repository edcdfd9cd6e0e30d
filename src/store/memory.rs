//! In-memory store with WAL durability and periodic snapshots
//!
//! A `HashMap` guarded by one RwLock. Every mutating call appends to the
//! WAL (when configured) before touching the map; after
//! `snapshot_threshold` WAL entries a snapshot is written under the same
//! write lock and the WAL is truncated.
//!
//! `get`/`contains` take the exclusive lock because they may evict an
//! expired entry; `len`/`is_empty` take the shared lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::clock::{system_clock, Clock};
use crate::error::Result;
use crate::store::{Snapshot, Store};
use crate::wal::{WalRecord, WriteAheadLog};

/// Construction options for [`MemoryStore`].
pub struct MemoryStoreOptions {
    /// WAL file path; `None` disables write-ahead logging.
    pub wal_path: Option<PathBuf>,

    /// Snapshot file path; `None` disables snapshotting.
    pub snapshot_path: Option<PathBuf>,

    /// WAL entries between automatic snapshots.
    pub snapshot_threshold: usize,

    /// Time source for TTL expiry.
    pub clock: Arc<dyn Clock>,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            wal_path: None,
            snapshot_path: None,
            snapshot_threshold: 10_000,
            clock: system_clock(),
        }
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at_ms: Option<i64>,
}

struct Inner {
    map: HashMap<Vec<u8>, Entry>,
    wal: Option<WriteAheadLog>,
    snapshot: Option<Snapshot>,
    wal_entries_since_snapshot: usize,
}

/// In-memory map backend.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    snapshot_threshold: usize,
}

impl MemoryStore {
    /// Volatile store with no persistence.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: HashMap::new(),
                wal: None,
                snapshot: None,
                wal_entries_since_snapshot: 0,
            }),
            clock: system_clock(),
            snapshot_threshold: 10_000,
        }
    }

    /// Open with the given options, recovering prior state.
    ///
    /// Recovery order is load snapshot, then replay WAL: the snapshot is a
    /// prefix of the mutation history and the WAL is its suffix. Entries
    /// already expired at load time are dropped.
    pub fn open(options: MemoryStoreOptions) -> Result<Self> {
        let clock = options.clock;
        let mut map: HashMap<Vec<u8>, Entry> = HashMap::new();

        let snapshot = match options.snapshot_path {
            Some(path) => {
                let mut snapshot = Snapshot::new(path);
                if snapshot.exists() {
                    let now = clock.now_ms();
                    snapshot.load(|key, value, expires_at_ms| {
                        if expires_at_ms.map_or(true, |ms| ms > now) {
                            map.insert(
                                key,
                                Entry {
                                    value,
                                    expires_at_ms,
                                },
                            );
                        }
                    })?;
                    tracing::info!(
                        "loaded snapshot: {} entries from {}",
                        snapshot.entry_count(),
                        snapshot.path().display()
                    );
                }
                Some(snapshot)
            }
            None => None,
        };

        let wal = match options.wal_path {
            Some(path) => {
                let wal = WriteAheadLog::open(path)?;
                let mut replayed = 0usize;
                wal.replay(|record| {
                    replayed += 1;
                    match record {
                        WalRecord::Put { key, value } => {
                            map.insert(
                                key,
                                Entry {
                                    value,
                                    expires_at_ms: None,
                                },
                            );
                        }
                        WalRecord::PutWithTtl {
                            key,
                            value,
                            expires_at_ms,
                        } => {
                            // already expired at load time: dropped
                            if expires_at_ms > clock.now_ms() {
                                map.insert(
                                    key,
                                    Entry {
                                        value,
                                        expires_at_ms: Some(expires_at_ms),
                                    },
                                );
                            }
                        }
                        WalRecord::Remove { key } => {
                            map.remove(&key);
                        }
                        WalRecord::Clear => map.clear(),
                    }
                })?;
                if replayed > 0 {
                    tracing::info!(
                        "replayed {} WAL records from {}",
                        replayed,
                        wal.path().display()
                    );
                }
                Some(wal)
            }
            None => None,
        };

        Ok(Self {
            inner: RwLock::new(Inner {
                map,
                wal,
                snapshot,
                wal_entries_since_snapshot: 0,
            }),
            clock,
            snapshot_threshold: options.snapshot_threshold,
        })
    }

    /// Take an explicit snapshot of the current live entries, truncating
    /// the WAL afterwards.
    pub fn snapshot(&self) -> Result<()> {
        let mut inner = self.inner.write();
        self.do_snapshot(&mut inner)
    }

    /// Erase every entry whose expiration has passed.
    pub fn cleanup_expired(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.write();
        inner
            .map
            .retain(|_, entry| entry.expires_at_ms.map_or(true, |ms| ms > now));
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry
            .expires_at_ms
            .map_or(false, |ms| self.clock.now_ms() >= ms)
    }

    /// Append one WAL record ahead of the map mutation. Runs under the
    /// caller's write lock.
    fn log(&self, inner: &mut Inner, record: &WalRecord) -> Result<()> {
        if let Some(wal) = &inner.wal {
            match record {
                WalRecord::Put { key, value } => wal.log_put(key, value)?,
                WalRecord::PutWithTtl {
                    key,
                    value,
                    expires_at_ms,
                } => wal.log_put_with_ttl(key, value, *expires_at_ms)?,
                WalRecord::Remove { key } => wal.log_remove(key)?,
                WalRecord::Clear => wal.log_clear()?,
            }
            inner.wal_entries_since_snapshot += 1;
        }
        Ok(())
    }

    /// Snapshot once the WAL entry threshold is reached. Called after the
    /// map mutation landed so the dump reflects every mutation serialized
    /// before it, including the one that tripped the threshold.
    fn maybe_snapshot(&self, inner: &mut Inner) -> Result<()> {
        if inner.snapshot.is_some() && inner.wal_entries_since_snapshot >= self.snapshot_threshold
        {
            self.do_snapshot(inner)?;
        }
        Ok(())
    }

    fn do_snapshot(&self, inner: &mut Inner) -> Result<()> {
        let now = self.clock.now_ms();
        let Inner {
            map,
            wal,
            snapshot,
            wal_entries_since_snapshot,
        } = inner;

        if let Some(snapshot) = snapshot {
            snapshot.save(
                map.iter()
                    .filter(|(_, entry)| entry.expires_at_ms.map_or(true, |ms| ms > now))
                    .map(|(key, entry)| {
                        (
                            key.as_slice(),
                            entry.value.as_slice(),
                            entry.expires_at_ms,
                        )
                    }),
            )?;
            if let Some(wal) = wal {
                wal.truncate()?;
            }
            *wal_entries_since_snapshot = 0;
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        self.log(
            &mut inner,
            &WalRecord::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )?;
        inner.map.insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                expires_at_ms: None,
            },
        );
        self.maybe_snapshot(&mut inner)
    }

    fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        let mut inner = self.inner.write();
        let expires_at_ms = self.clock.now_ms() + ttl.as_millis() as i64;
        self.log(
            &mut inner,
            &WalRecord::PutWithTtl {
                key: key.to_vec(),
                value: value.to_vec(),
                expires_at_ms,
            },
        )?;
        inner.map.insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                expires_at_ms: Some(expires_at_ms),
            },
        );
        self.maybe_snapshot(&mut inner)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // exclusive lock: an expired entry is evicted on sight
        let mut inner = self.inner.write();
        match inner.map.get(key) {
            None => return Ok(None),
            Some(entry) if !self.is_expired(entry) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        inner.map.remove(key);
        Ok(None)
    }

    fn remove(&self, key: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write();
        self.log(&mut inner, &WalRecord::Remove { key: key.to_vec() })?;
        let removed = inner.map.remove(key).is_some();
        self.maybe_snapshot(&mut inner)?;
        Ok(removed)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write();
        match inner.map.get(key) {
            None => return Ok(false),
            Some(entry) if !self.is_expired(entry) => return Ok(true),
            Some(_) => {}
        }
        inner.map.remove(key);
        Ok(false)
    }

    fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        self.log(&mut inner, &WalRecord::Clear)?;
        inner.map.clear();
        self.maybe_snapshot(&mut inner)
    }

    fn flush(&self) -> Result<()> {
        let inner = self.inner.write();
        if let Some(wal) = &inner.wal {
            wal.sync()?;
        }
        Ok(())
    }
}
