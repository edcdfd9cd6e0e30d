//! Binary IO helpers
//!
//! Fixed-width integer and length-prefixed byte-string codecs, used by the
//! WAL, snapshot, and disk-store files (stream half) and by the binary
//! wire protocol (buffer half). All integers are big-endian; strings are
//! always a u32 length followed by that many raw bytes.

use std::io::{Read, Write};

use crate::error::{FerroError, Result};

// =============================================================================
// Stream-based IO (files: WAL, snapshot, disk store)
// =============================================================================

pub fn write_u8<W: Write>(out: &mut W, value: u8) -> std::io::Result<()> {
    out.write_all(&[value])
}

pub fn write_u32<W: Write>(out: &mut W, value: u32) -> std::io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

pub fn write_u64<W: Write>(out: &mut W, value: u64) -> std::io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

pub fn write_i64<W: Write>(out: &mut W, value: i64) -> std::io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

/// Write a u32 length prefix followed by the raw bytes.
pub fn write_bytes<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write_u32(out, bytes.len() as u32)?;
    out.write_all(bytes)
}

/// Short reads surface as `ErrorKind::UnexpectedEof`; callers replaying a
/// log treat that as the crash tail and stop.
pub fn read_u8<R: Read>(input: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u32<R: Read>(input: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub fn read_u64<R: Read>(input: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

pub fn read_i64<R: Read>(input: &mut R) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

/// Read a u32 length prefix and then that many raw bytes.
pub fn read_bytes<R: Read>(input: &mut R) -> std::io::Result<Vec<u8>> {
    let len = read_u32(input)? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

// =============================================================================
// Buffer-based IO (wire: binary protocol)
// =============================================================================

pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Append a u32 length prefix followed by the raw bytes.
pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

/// Cursor over a byte buffer with bounds-checked reads.
///
/// Reading past the end fails with a protocol error rather than panicking,
/// so a truncated field inside an otherwise complete message is reported
/// to the peer instead of killing the connection worker.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(FerroError::Protocol(format!(
                "buffer underflow: need {} bytes, have {}",
                n,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(u64::from_be_bytes(out))
    }

    /// Read a u32 length prefix and then that many raw bytes.
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}
