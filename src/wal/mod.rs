//! Write-Ahead Log (WAL) Module
//!
//! Append-only durable log of store mutations. Every mutating call on the
//! memory store appends one record here and flushes before the in-memory
//! map changes, so the map can be reconstructed after a crash.
//!
//! ## File Format
//! ```text
//! ┌───────────┬─────────────┬──────────┬──────────┬─────┐
//! │ magic (4) │ version (4) │ record 1 │ record 2 │ ... │
//! └───────────┴─────────────┴──────────┴──────────┴─────┘
//! ```
//!
//! A process killed mid-append leaves a short record at the tail; replay
//! stops there silently instead of failing, matching the real-world crash
//! case. A bad magic or version is fatal corruption.

mod record;

pub use record::WalRecord;

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{FerroError, Result};
use crate::io::{read_u32, write_u32};

/// Magic prefix of WAL files: "KVWL".
pub const WAL_MAGIC: u32 = 0x4B56_574C;
/// Current WAL format version.
pub const WAL_VERSION: u32 = 1;

/// Append-only mutation log.
///
/// A single mutex serializes all writes and excludes replay from running
/// concurrently with an append.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl WriteAheadLog {
    /// Open (or create) the log at `path` in append mode. An empty file
    /// gets a fresh header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                FerroError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to open WAL file {}: {}", path.display(), e),
                ))
            })?;

        let mut writer = BufWriter::new(file);
        if std::fs::metadata(&path)?.len() == 0 {
            write_header(&mut writer)?;
        }

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn log_put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(&WalRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    pub fn log_put_with_ttl(&self, key: &[u8], value: &[u8], expires_at_ms: i64) -> Result<()> {
        self.append(&WalRecord::PutWithTtl {
            key: key.to_vec(),
            value: value.to_vec(),
            expires_at_ms,
        })
    }

    pub fn log_remove(&self, key: &[u8]) -> Result<()> {
        self.append(&WalRecord::Remove { key: key.to_vec() })
    }

    pub fn log_clear(&self) -> Result<()> {
        self.append(&WalRecord::Clear)
    }

    /// Append one record and flush it to the OS.
    fn append(&self, record: &WalRecord) -> Result<()> {
        let mut writer = self.writer.lock();
        record.write_to(&mut *writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Replay every record from the start of the log in append order.
    ///
    /// Validates the header, then iterates records until the first short
    /// or malformed read, which is treated as the crash tail and ends
    /// replay cleanly.
    pub fn replay<F: FnMut(WalRecord)>(&self, mut callback: F) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        validate_header(&mut reader, &self.path)?;

        loop {
            match WalRecord::read_from(&mut reader) {
                Ok(record) => callback(record),
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        tracing::debug!(
                            "WAL replay stopped at malformed tail record: {}",
                            e
                        );
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Flush buffered data to the OS and force it to stable storage.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Discard all records: reopen the file empty with a fresh header.
    pub fn truncate(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| {
                FerroError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to truncate WAL file {}: {}", self.path.display(), e),
                ))
            })?;
        *writer = BufWriter::new(file);
        write_header(&mut *writer)?;
        Ok(())
    }

    /// Current file size in bytes.
    pub fn size(&self) -> Result<u64> {
        let _guard = self.writer.lock();
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_header<W: Write>(out: &mut W) -> Result<()> {
    write_u32(out, WAL_MAGIC)?;
    write_u32(out, WAL_VERSION)?;
    out.flush()?;
    Ok(())
}

fn validate_header<R: std::io::Read>(input: &mut R, path: &Path) -> Result<()> {
    let magic = read_u32(input)
        .map_err(|_| FerroError::Corruption(format!("{}: missing WAL header", path.display())))?;
    if magic != WAL_MAGIC {
        return Err(FerroError::Corruption(format!(
            "{}: bad WAL magic 0x{:08X}",
            path.display(),
            magic
        )));
    }
    let version = read_u32(input)
        .map_err(|_| FerroError::Corruption(format!("{}: missing WAL version", path.display())))?;
    if version != WAL_VERSION {
        return Err(FerroError::Corruption(format!(
            "{}: unsupported WAL version {}",
            path.display(),
            version
        )));
    }
    Ok(())
}
