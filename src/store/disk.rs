//! Log-structured disk store
//!
//! All writes append records to a single data file; an in-memory index
//! maps each key to the offset of its newest record. Deletions append
//! tombstone records. Once enough tombstones accumulate, compaction
//! rewrites the file keeping only live records.
//!
//! ## File Format
//! ```text
//! ┌───────────┬─────────────┬──────────┬──────────┬─────┐
//! │ magic (4) │ version (4) │ record 1 │ record 2 │ ... │
//! └───────────┴─────────────┴──────────┴──────────┴─────┘
//! ```
//! Each record: `tombstone (1) | key (len32) | value (len32) |
//! has_expiration (1) | [expires_ms (8)]`.
//!
//! Startup rebuilds the index by folding the file left to right: later
//! records override earlier ones and tombstones delete. A short read at a
//! record boundary is the crash tail and ends the fold cleanly.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::clock::{system_clock, Clock};
use crate::error::{FerroError, Result};
use crate::io::{
    read_bytes, read_i64, read_u32, read_u8, write_bytes, write_i64, write_u32, write_u8,
};
use crate::store::Store;

/// Magic prefix of data files: "KVDS".
pub const DATA_MAGIC: u32 = 0x4B56_4453;
/// Current data file format version.
pub const DATA_VERSION: u32 = 1;

const RECORD_LIVE: u8 = 0;
const RECORD_TOMBSTONE: u8 = 1;

/// Name of the data file inside the data directory.
const DATA_FILE_NAME: &str = "data.kvds";

/// Construction options for [`DiskStore`].
pub struct DiskStoreOptions {
    /// Directory holding the data file; created if missing.
    pub data_dir: PathBuf,

    /// Tombstone records before automatic compaction.
    pub compaction_threshold: usize,

    /// Time source for TTL expiry.
    pub clock: Arc<dyn Clock>,
}

impl Default for DiskStoreOptions {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compaction_threshold: 1_000,
            clock: system_clock(),
        }
    }
}

/// Index entry pointing at the newest record for a key.
#[derive(Debug, Clone)]
struct IndexEntry {
    /// File offset of the record header.
    offset: u64,
    value_len: u32,
    expires_at_ms: Option<i64>,
}

struct DiskInner {
    file: File,
    /// Ordered so compaction rewrites records deterministically; compacting
    /// an already-compact file reproduces it byte for byte.
    index: BTreeMap<Vec<u8>, IndexEntry>,
    /// Live (non-tombstone) entries; always equals `index.len()`.
    entry_count: usize,
    /// Tombstone records appended since the last compaction. Overwritten
    /// records leave dead bytes but do not count here.
    tombstone_count: usize,
}

/// Log-structured file backend.
pub struct DiskStore {
    inner: RwLock<DiskInner>,
    data_path: PathBuf,
    compaction_threshold: usize,
    clock: Arc<dyn Clock>,
}

impl DiskStore {
    /// Open (or create) the store under `options.data_dir`, rebuilding
    /// the index from the data file.
    pub fn open(options: DiskStoreOptions) -> Result<Self> {
        std::fs::create_dir_all(&options.data_dir)?;
        let data_path = options.data_dir.join(DATA_FILE_NAME);

        let file = open_data_file(&data_path)?;

        let mut inner = DiskInner {
            file,
            index: BTreeMap::new(),
            entry_count: 0,
            tombstone_count: 0,
        };

        if inner.file.metadata()?.len() == 0 {
            write_header(&mut inner.file)?;
        } else {
            load_index(&mut inner, &data_path)?;
            tracing::info!(
                "loaded disk store index: {} live entries, {} tombstones from {}",
                inner.entry_count,
                inner.tombstone_count,
                data_path.display()
            );
        }

        Ok(Self {
            inner: RwLock::new(inner),
            data_path,
            compaction_threshold: options.compaction_threshold,
            clock: options.clock,
        })
    }

    /// Rewrite the data file keeping only live, non-expired records.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.write();
        self.do_compact(&mut inner)
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    fn is_expired(&self, entry: &IndexEntry) -> bool {
        entry
            .expires_at_ms
            .map_or(false, |ms| self.clock.now_ms() >= ms)
    }

    fn put_impl(&self, key: &[u8], value: &[u8], expires_at_ms: Option<i64>) -> Result<()> {
        let mut inner = self.inner.write();
        append_record(&mut inner, key, value, expires_at_ms, false)?;
        self.maybe_compact(&mut inner)
    }

    fn maybe_compact(&self, inner: &mut DiskInner) -> Result<()> {
        if inner.tombstone_count >= self.compaction_threshold {
            self.do_compact(inner)?;
        }
        Ok(())
    }

    fn do_compact(&self, inner: &mut DiskInner) -> Result<()> {
        let temp_path = temp_path_for(&self.data_path);
        {
            let temp_file = File::create(&temp_path).map_err(|e| {
                FerroError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to open compaction temp file {}: {}",
                        temp_path.display(),
                        e
                    ),
                ))
            })?;
            let mut out = BufWriter::new(temp_file);
            write_header(&mut out)?;

            // split borrow: read from the live file while walking the index
            let DiskInner { file, index, .. } = inner;
            for (key, entry) in index.iter() {
                if entry
                    .expires_at_ms
                    .map_or(false, |ms| self.clock.now_ms() >= ms)
                {
                    continue;
                }
                let value = read_value_at(file, entry)?;
                write_record(&mut out, key, &value, entry.expires_at_ms, false)?;
            }

            out.flush()?;
            out.get_ref().sync_all()?;
        }

        // the live file is replaced only after the temp is fully written
        std::fs::rename(&temp_path, &self.data_path)?;
        inner.file = open_data_file(&self.data_path)?;

        inner.index.clear();
        inner.entry_count = 0;
        inner.tombstone_count = 0;
        load_index(inner, &self.data_path)?;
        inner.tombstone_count = 0;

        tracing::debug!(
            "compaction complete: {} live entries in {}",
            inner.entry_count,
            self.data_path.display()
        );
        Ok(())
    }
}

impl Store for DiskStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_impl(key, value, None)
    }

    fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        let expires_at_ms = self.clock.now_ms() + ttl.as_millis() as i64;
        self.put_impl(key, value, Some(expires_at_ms))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // exclusive lock: an expired entry is tombstoned on sight.
        // No compaction trigger here, reads stay cheap.
        let mut inner = self.inner.write();
        let entry = match inner.index.get(key) {
            None => return Ok(None),
            Some(entry) => entry.clone(),
        };
        if self.is_expired(&entry) {
            append_record(&mut inner, key, &[], None, true)?;
            return Ok(None);
        }
        Ok(Some(read_value_at(&mut inner.file, &entry)?))
    }

    fn remove(&self, key: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write();
        if !inner.index.contains_key(key) {
            return Ok(false);
        }
        append_record(&mut inner, key, &[], None, true)?;
        self.maybe_compact(&mut inner)?;
        Ok(true)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write();
        let entry = match inner.index.get(key) {
            None => return Ok(false),
            Some(entry) => entry.clone(),
        };
        if self.is_expired(&entry) {
            append_record(&mut inner, key, &[], None, true)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn len(&self) -> usize {
        self.inner.read().entry_count
    }

    fn is_empty(&self) -> bool {
        self.inner.read().entry_count == 0
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(true)
            .open(&self.data_path)?;
        write_header(&mut file)?;
        inner.file = file;
        inner.index.clear();
        inner.entry_count = 0;
        inner.tombstone_count = 0;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.compact()
    }
}

fn open_data_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|e| {
            FerroError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open data file {}: {}", path.display(), e),
            ))
        })
}

fn write_header<W: Write>(out: &mut W) -> Result<()> {
    write_u32(out, DATA_MAGIC)?;
    write_u32(out, DATA_VERSION)?;
    out.flush()?;
    Ok(())
}

fn write_record<W: Write>(
    out: &mut W,
    key: &[u8],
    value: &[u8],
    expires_at_ms: Option<i64>,
    tombstone: bool,
) -> Result<()> {
    write_u8(out, if tombstone { RECORD_TOMBSTONE } else { RECORD_LIVE })?;
    write_bytes(out, key)?;
    write_bytes(out, value)?;
    match expires_at_ms {
        Some(ms) => {
            write_u8(out, 1)?;
            write_i64(out, ms)?;
        }
        None => write_u8(out, 0)?,
    }
    Ok(())
}

/// Append one record at the end of the data file and fold it into the
/// index, maintaining both counters.
fn append_record(
    inner: &mut DiskInner,
    key: &[u8],
    value: &[u8],
    expires_at_ms: Option<i64>,
    tombstone: bool,
) -> Result<()> {
    let offset = inner.file.seek(SeekFrom::End(0))?;
    write_record(&mut inner.file, key, value, expires_at_ms, tombstone)?;
    inner.file.flush()?;

    if tombstone {
        if inner.index.remove(key).is_some() {
            inner.entry_count -= 1;
        }
        inner.tombstone_count += 1;
    } else {
        let entry = IndexEntry {
            offset,
            value_len: value.len() as u32,
            expires_at_ms,
        };
        if inner.index.insert(key.to_vec(), entry).is_none() {
            inner.entry_count += 1;
        }
    }
    Ok(())
}

/// Seek to a record and read its value field, skipping the tombstone flag
/// and the key string.
fn read_value_at(file: &mut File, entry: &IndexEntry) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(entry.offset))?;
    read_u8(file)?;
    let _key = read_bytes(file)?;
    let value = read_bytes(file)?;
    debug_assert_eq!(value.len() as u32, entry.value_len);
    Ok(value)
}

/// Deterministic left-to-right fold of the data file into the index.
fn load_index(inner: &mut DiskInner, path: &Path) -> Result<()> {
    inner.file.seek(SeekFrom::Start(0))?;

    let magic = read_u32(&mut inner.file)
        .map_err(|_| FerroError::Corruption(format!("{}: missing header", path.display())))?;
    if magic != DATA_MAGIC {
        return Err(FerroError::Corruption(format!(
            "{}: bad data file magic 0x{:08X}",
            path.display(),
            magic
        )));
    }
    let version = read_u32(&mut inner.file)
        .map_err(|_| FerroError::Corruption(format!("{}: missing version", path.display())))?;
    if version != DATA_VERSION {
        return Err(FerroError::Corruption(format!(
            "{}: unsupported data file version {}",
            path.display(),
            version
        )));
    }

    loop {
        let offset = inner.file.stream_position()?;

        let flag = match read_u8(&mut inner.file) {
            Ok(flag) => flag,
            Err(_) => break,
        };
        let key = match read_bytes(&mut inner.file) {
            Ok(key) => key,
            Err(_) => break,
        };
        let value = match read_bytes(&mut inner.file) {
            Ok(value) => value,
            Err(_) => break,
        };
        let has_expiration = match read_u8(&mut inner.file) {
            Ok(b) => b,
            Err(_) => break,
        };
        let expires_at_ms = if has_expiration != 0 {
            match read_i64(&mut inner.file) {
                Ok(ms) => Some(ms),
                Err(_) => break,
            }
        } else {
            None
        };

        if flag == RECORD_TOMBSTONE {
            if inner.index.remove(&key).is_some() {
                inner.entry_count -= 1;
            }
            inner.tombstone_count += 1;
        } else {
            let entry = IndexEntry {
                offset,
                value_len: value.len() as u32,
                expires_at_ms,
            };
            if inner.index.insert(key, entry).is_none() {
                inner.entry_count += 1;
            }
        }
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
