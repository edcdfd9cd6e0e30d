//! WAL record definitions and per-record codec
//!
//! ## Record Format
//! ```text
//! ┌──────────┬──────────────────┬────────────────────┬──────────────────┐
//! │ kind (1) │ key (len32+data) │ value (len32+data) │ expires_ms (8)?  │
//! └──────────┴──────────────────┴────────────────────┴──────────────────┘
//! ```
//! The expiration field is present only for `PutWithTtl` records.

use std::io::{self, Read, Write};

use crate::io::{read_bytes, read_i64, read_u8, write_bytes, write_i64, write_u8};

const KIND_PUT: u8 = 1;
const KIND_PUT_WITH_TTL: u8 = 2;
const KIND_REMOVE: u8 = 3;
const KIND_CLEAR: u8 = 4;

/// A single logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
    },
    PutWithTtl {
        key: Vec<u8>,
        value: Vec<u8>,
        expires_at_ms: i64,
    },
    Remove {
        key: Vec<u8>,
    },
    Clear,
}

impl WalRecord {
    fn kind(&self) -> u8 {
        match self {
            WalRecord::Put { .. } => KIND_PUT,
            WalRecord::PutWithTtl { .. } => KIND_PUT_WITH_TTL,
            WalRecord::Remove { .. } => KIND_REMOVE,
            WalRecord::Clear => KIND_CLEAR,
        }
    }

    /// Serialize one record. Remove and Clear carry empty value/key fields
    /// so every record shares the same frame.
    pub(crate) fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_u8(out, self.kind())?;
        match self {
            WalRecord::Put { key, value } => {
                write_bytes(out, key)?;
                write_bytes(out, value)?;
            }
            WalRecord::PutWithTtl {
                key,
                value,
                expires_at_ms,
            } => {
                write_bytes(out, key)?;
                write_bytes(out, value)?;
                write_i64(out, *expires_at_ms)?;
            }
            WalRecord::Remove { key } => {
                write_bytes(out, key)?;
                write_bytes(out, &[])?;
            }
            WalRecord::Clear => {
                write_bytes(out, &[])?;
                write_bytes(out, &[])?;
            }
        }
        Ok(())
    }

    /// Deserialize one record. Any failure, including an unknown kind byte,
    /// is reported as an error; replay treats that as the crash tail.
    pub(crate) fn read_from<R: Read>(input: &mut R) -> io::Result<WalRecord> {
        let kind = read_u8(input)?;
        let key = read_bytes(input)?;
        let value = read_bytes(input)?;
        match kind {
            KIND_PUT => Ok(WalRecord::Put { key, value }),
            KIND_PUT_WITH_TTL => {
                let expires_at_ms = read_i64(input)?;
                Ok(WalRecord::PutWithTtl {
                    key,
                    value,
                    expires_at_ms,
                })
            }
            KIND_REMOVE => Ok(WalRecord::Remove { key }),
            KIND_CLEAR => Ok(WalRecord::Clear),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown WAL record kind: {}", other),
            )),
        }
    }
}
