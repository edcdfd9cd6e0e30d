//! Binary protocol codec
//!
//! Length-prefixed framing, fully 8-bit clean (embedded NULs included).
//! All integers are big-endian.
//!
//! ## Wire Format
//! ```text
//! ┌────────────────┬─────────────────────────────────┐
//! │ length (4, BE) │ payload (length bytes)          │
//! └────────────────┴─────────────────────────────────┘
//! request payload:  cmd (1) | command-specific fields
//! response payload: status (1) | [data (len32+bytes) when non-empty]
//! ```
//!
//! Decoding is incremental: a buffer that does not yet hold one complete
//! frame decodes to `Ok(None)` ("need more bytes"), which is distinct
//! from a malformed complete frame (`Err`).

use crate::error::{FerroError, Result};
use crate::io::{put_bytes, put_u32, put_u64, put_u8, ByteReader};

use super::{Command, Request, Response, Status};

/// Frame length prefix size in bytes.
pub const LENGTH_PREFIX: usize = 4;

/// Whether `buf` starts with one complete length-prefixed message.
pub fn has_complete_message(buf: &[u8]) -> bool {
    if buf.len() < LENGTH_PREFIX {
        return false;
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    buf.len() >= LENGTH_PREFIX + len
}

/// Total size of the frame at the head of `buf`, if complete.
fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < LENGTH_PREFIX {
        return None;
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if buf.len() < LENGTH_PREFIX + len {
        return None;
    }
    Some(LENGTH_PREFIX + len)
}

/// Encode a request as one framed message.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut payload = Vec::new();
    put_u8(&mut payload, req.command as u8);

    match req.command {
        Command::Get | Command::Del | Command::Exists => {
            put_bytes(&mut payload, &req.key);
        }
        Command::Put => {
            put_bytes(&mut payload, &req.key);
            put_bytes(&mut payload, &req.value);
        }
        Command::PutEx => {
            put_bytes(&mut payload, &req.key);
            put_bytes(&mut payload, &req.value);
            put_u64(&mut payload, req.ttl_ms as u64);
        }
        _ => {}
    }

    frame(payload)
}

/// Encode a response as one framed message.
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut payload = Vec::new();
    put_u8(&mut payload, resp.status as u8);
    if !resp.data.is_empty() {
        put_bytes(&mut payload, &resp.data);
    }
    frame(payload)
}

/// Decode one request from the head of `buf`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete frame;
/// on success returns the request and the bytes consumed
/// (`4 + payload length`).
pub fn decode_request(buf: &[u8]) -> Result<Option<(Request, usize)>> {
    let consumed = match frame_len(buf) {
        Some(n) => n,
        None => return Ok(None),
    };
    let payload = &buf[LENGTH_PREFIX..consumed];
    if payload.is_empty() {
        return Err(FerroError::Protocol("empty message".into()));
    }

    let mut reader = ByteReader::new(payload);
    let cmd_byte = reader.u8()?;
    let command = match Command::from_u8(cmd_byte) {
        Some(Command::Unknown) | None => {
            return Err(FerroError::Protocol(format!(
                "unknown command byte: 0x{:02X}",
                cmd_byte
            )))
        }
        Some(cmd) => cmd,
    };

    let mut req = Request {
        command,
        ..Request::default()
    };

    match command {
        Command::Get | Command::Del | Command::Exists => {
            req.key = reader.bytes()?;
        }
        Command::Put => {
            req.key = reader.bytes()?;
            req.value = reader.bytes()?;
        }
        Command::PutEx => {
            req.key = reader.bytes()?;
            req.value = reader.bytes()?;
            req.ttl_ms = reader.u64()? as i64;
        }
        _ => {}
    }

    Ok(Some((req, consumed)))
}

/// Decode one response from the head of `buf`; same incremental contract
/// as [`decode_request`].
pub fn decode_response(buf: &[u8]) -> Result<Option<(Response, usize)>> {
    let consumed = match frame_len(buf) {
        Some(n) => n,
        None => return Ok(None),
    };
    let payload = &buf[LENGTH_PREFIX..consumed];
    if payload.is_empty() {
        return Err(FerroError::Protocol("empty message".into()));
    }

    let mut reader = ByteReader::new(payload);
    let status_byte = reader.u8()?;
    let status = Status::from_u8(status_byte).ok_or_else(|| {
        FerroError::Protocol(format!("unknown status byte: 0x{:02X}", status_byte))
    })?;

    let data = if reader.remaining() > 0 {
        reader.bytes()?
    } else {
        Vec::new()
    };

    Ok(Some((
        Response {
            status,
            data,
            close_connection: status == Status::Bye,
        },
        consumed,
    )))
}

fn frame(payload: Vec<u8>) -> Vec<u8> {
    let mut message = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    put_u32(&mut message, payload.len() as u32);
    message.extend_from_slice(&payload);
    message
}
