//! Storage Module
//!
//! Two interchangeable backends behind one operation set:
//!
//! - [`MemoryStore`]: an in-memory map fronted by a write-ahead log with
//!   periodic snapshotting.
//! - [`DiskStore`]: a log-structured on-disk file with an in-memory index
//!   and compaction.
//!
//! The TCP server holds `Arc<dyn Store>` and never knows which backend it
//! is driving.

mod disk;
mod memory;
mod snapshot;

pub use disk::{DiskStore, DiskStoreOptions};
pub use memory::{MemoryStore, MemoryStoreOptions};
pub use snapshot::Snapshot;

use std::time::Duration;

use crate::error::Result;

/// Operation set shared by both storage backends.
///
/// Keys and values are arbitrary byte strings; empty keys and empty values
/// are permitted at this layer (the wire dispatcher rejects empty keys for
/// commands that require one).
pub trait Store: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Insert with a time-to-live; the entry expires `ttl` after now.
    fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns whether a live entry was removed.
    fn remove(&self, key: &[u8]) -> Result<bool>;

    fn contains(&self, key: &[u8]) -> Result<bool>;

    /// Count of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool;

    fn clear(&self) -> Result<()>;

    /// Backend-defined maintenance: the memory store syncs its WAL, the
    /// disk store compacts its data file.
    fn flush(&self) -> Result<()>;
}
