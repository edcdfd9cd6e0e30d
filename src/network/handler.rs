//! Server-side protocol driver
//!
//! One driver per connection. The framing is chosen by peeking at the
//! first byte without consuming it: NUL or a high-bit byte means binary
//! (a binary frame starts with the top byte of a big-endian length, which
//! is 0x00 for any sane message), a printable ASCII byte means a text
//! command. The heuristic is advisory; clients know which protocol they
//! speak, and `force_binary` bypasses it entirely.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::Result;
use crate::protocol::{binary, text, Request, Response};

const READ_CHUNK: usize = 1024;

/// Per-connection framing driver with a read buffer carried across
/// requests.
pub(crate) enum ProtocolDriver {
    Text { buffer: Vec<u8> },
    Binary { buffer: Vec<u8> },
}

impl ProtocolDriver {
    /// Choose a framing for a fresh connection by peeking its first byte.
    ///
    /// Returns `Ok(None)` if the peer closed before sending anything.
    pub fn detect(stream: &TcpStream, force_binary: bool) -> Result<Option<ProtocolDriver>> {
        if force_binary {
            return Ok(Some(ProtocolDriver::binary()));
        }

        let mut first = [0u8; 1];
        let n = match stream.peek(&mut first) {
            Ok(n) => n,
            Err(_) => return Ok(None),
        };
        if n == 0 {
            return Ok(None);
        }

        if first[0] == 0x00 || first[0] > 127 {
            Ok(Some(ProtocolDriver::binary()))
        } else {
            Ok(Some(ProtocolDriver::text()))
        }
    }

    pub fn text() -> ProtocolDriver {
        ProtocolDriver::Text { buffer: Vec::new() }
    }

    pub fn binary() -> ProtocolDriver {
        ProtocolDriver::Binary { buffer: Vec::new() }
    }

    /// Read one request.
    ///
    /// `Ok(None)` means the peer is gone (EOF or socket error): exit
    /// cleanly. `Err` means a malformed complete message: the worker
    /// answers with an error response and keeps the connection open.
    pub fn read_request(&mut self, stream: &mut TcpStream) -> Result<Option<Request>> {
        match self {
            ProtocolDriver::Text { buffer } => match read_line(stream, buffer) {
                Some(line) => Ok(Some(text::decode_request(&line))),
                None => Ok(None),
            },
            ProtocolDriver::Binary { buffer } => {
                while !binary::has_complete_message(buffer) {
                    let mut chunk = [0u8; READ_CHUNK];
                    match stream.read(&mut chunk) {
                        Ok(0) | Err(_) => return Ok(None),
                        Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                    }
                }
                match binary::decode_request(buffer) {
                    Ok(Some((req, consumed))) => {
                        buffer.drain(..consumed);
                        Ok(Some(req))
                    }
                    // the frame is complete, so this is unreachable; treat
                    // it as exhaustion to be safe
                    Ok(None) => Ok(None),
                    Err(e) => {
                        // drop the malformed frame so the next read does
                        // not see it again
                        let len =
                            u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]])
                                as usize;
                        let consumed = (4 + len).min(buffer.len());
                        buffer.drain(..consumed);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Frame and write one response; false when the peer is unreachable.
    pub fn write_response(&mut self, stream: &mut TcpStream, response: &Response) -> bool {
        let bytes = match self {
            ProtocolDriver::Text { .. } => text::encode_response(response),
            ProtocolDriver::Binary { .. } => binary::encode_response(response),
        };
        send_all(stream, &bytes)
    }
}

/// Write the whole buffer, looping on short writes.
pub(crate) fn send_all(stream: &mut TcpStream, bytes: &[u8]) -> bool {
    stream.write_all(bytes).is_ok()
}

/// Read one LF-terminated line, buffering partial reads across calls.
/// Strips the trailing `\n` and an optional `\r`. `None` on EOF or
/// socket error.
pub(crate) fn read_line(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    loop {
        if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(line);
        }

        let mut chunk = [0u8; READ_CHUNK];
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}
