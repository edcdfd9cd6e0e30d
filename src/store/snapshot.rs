//! Snapshot
//!
//! Atomic whole-store dump used together with the WAL for bounded
//! recovery time. Saving writes to `<path>.tmp` and renames over the
//! target, so a crash mid-save leaves the previous snapshot intact.
//!
//! ## File Format
//! ```text
//! ┌───────────┬─────────────┬───────────┬─────────┬─────┐
//! │ magic (4) │ version (4) │ count (8) │ entry 1 │ ... │
//! └───────────┴─────────────┴───────────┴─────────┴─────┘
//! ```
//! Each entry: `key (len32) | value (len32) | has_expiration (1) |
//! [expires_ms (8)]`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{FerroError, Result};
use crate::io::{
    read_bytes, read_i64, read_u32, read_u64, read_u8, write_bytes, write_i64, write_u32,
    write_u64, write_u8,
};

/// Magic prefix of snapshot files: "KVSN".
pub const SNAPSHOT_MAGIC: u32 = 0x4B56_534E;
/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Whole-state dump writer/loader for one snapshot path.
pub struct Snapshot {
    path: PathBuf,
    entry_count: u64,
}

impl Snapshot {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entry_count: 0,
        }
    }

    /// Write a full dump atomically.
    ///
    /// The caller supplies the live entries as `(key, value, expires_ms)`
    /// tuples and is expected to hold its own write lock while the
    /// iterator runs, so the dump is a consistent point-in-time state.
    pub fn save<'a, I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8], Option<i64>)>,
    {
        let temp_path = temp_path_for(&self.path);
        let mut count: u64 = 0;
        {
            let file = File::create(&temp_path).map_err(|e| {
                FerroError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to open snapshot file {}: {}", temp_path.display(), e),
                ))
            })?;
            let mut out = BufWriter::new(file);

            write_u32(&mut out, SNAPSHOT_MAGIC)?;
            write_u32(&mut out, SNAPSHOT_VERSION)?;
            // count placeholder, rewritten once iteration finishes
            let count_pos = out.stream_position()?;
            write_u64(&mut out, 0)?;

            for (key, value, expires_at_ms) in entries {
                write_bytes(&mut out, key)?;
                write_bytes(&mut out, value)?;
                match expires_at_ms {
                    Some(ms) => {
                        write_u8(&mut out, 1)?;
                        write_i64(&mut out, ms)?;
                    }
                    None => write_u8(&mut out, 0)?,
                }
                count += 1;
            }

            out.seek(SeekFrom::Start(count_pos))?;
            write_u64(&mut out, count)?;
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        std::fs::rename(&temp_path, &self.path)?;

        self.entry_count = count;
        tracing::debug!(
            "snapshot saved: {} entries to {}",
            count,
            self.path.display()
        );
        Ok(())
    }

    /// Iterate the saved entries. A missing file is an empty snapshot;
    /// anything malformed in an existing file is fatal corruption.
    pub fn load<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(Vec<u8>, Vec<u8>, Option<i64>),
    {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let mut input = BufReader::new(file);

        self.validate_header(&mut input)?;
        let count = read_u64(&mut input)
            .map_err(|_| self.corrupt("truncated entry count"))?;

        for _ in 0..count {
            let key = read_bytes(&mut input).map_err(|_| self.corrupt("truncated entry"))?;
            let value = read_bytes(&mut input).map_err(|_| self.corrupt("truncated entry"))?;
            let has_expiration =
                read_u8(&mut input).map_err(|_| self.corrupt("truncated entry"))?;
            let expires_at_ms = if has_expiration != 0 {
                Some(read_i64(&mut input).map_err(|_| self.corrupt("truncated entry"))?)
            } else {
                None
            };
            callback(key, value, expires_at_ms);
        }

        self.entry_count = count;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry count of the last save or load.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn validate_header<R: std::io::Read>(&self, input: &mut R) -> Result<()> {
        let magic = read_u32(input).map_err(|_| self.corrupt("missing header"))?;
        if magic != SNAPSHOT_MAGIC {
            return Err(self.corrupt(&format!("bad magic 0x{:08X}", magic)));
        }
        let version = read_u32(input).map_err(|_| self.corrupt("missing version"))?;
        if version != SNAPSHOT_VERSION {
            return Err(self.corrupt(&format!("unsupported version {}", version)));
        }
        Ok(())
    }

    fn corrupt(&self, what: &str) -> FerroError {
        FerroError::Corruption(format!("snapshot {}: {}", self.path.display(), what))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
