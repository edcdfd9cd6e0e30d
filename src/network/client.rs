//! Client
//!
//! Blocking client over one TCP stream. Encodes requests with the chosen
//! codec, writes them fully, and buffers reads until one complete
//! response is framed. Convenience wrappers mirror the store interface.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{FerroError, Result};
use crate::protocol::{binary, text, Command, Request, Response, Status};

const READ_CHUNK: usize = 1024;

/// Construction options for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,

    /// Speak the binary protocol instead of the text protocol.
    pub binary: bool,

    /// Socket read/write timeout.
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            binary: false,
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Blocking TCP client for a FerroKV server.
pub struct Client {
    options: ClientOptions,
    stream: Option<TcpStream>,
    /// Read buffer carried between responses (binary framing may deliver
    /// more than one message per read).
    buffer: Vec<u8>,
}

impl Client {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            stream: None,
            buffer: Vec::new(),
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = (self.options.host.as_str(), self.options.port)
            .to_socket_addrs()
            .map_err(|e| FerroError::Network(format!("invalid address: {}", e)))?
            .next()
            .ok_or_else(|| {
                FerroError::Network(format!("cannot resolve {}", self.options.host))
            })?;

        let stream = match self.options.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| FerroError::Network(format!("failed to connect to {}: {}", addr, e)))?;

        stream.set_read_timeout(self.options.timeout)?;
        stream.set_write_timeout(self.options.timeout)?;

        self.stream = Some(stream);
        self.buffer.clear();
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream = None;
        self.buffer.clear();
    }

    pub fn connected(&self) -> bool {
        self.stream.is_some()
    }

    /// One request-response round trip.
    pub fn execute(&mut self, request: &Request) -> Result<Response> {
        let encoded = if self.options.binary {
            binary::encode_request(request)
        } else {
            text::encode_request(request)
        };

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| FerroError::Network("not connected".into()))?;

        if stream.write_all(&encoded).is_err() {
            self.disconnect();
            return Err(FerroError::Network("failed to send request".into()));
        }

        let response = if self.options.binary {
            read_binary_response(stream, &mut self.buffer)
        } else {
            read_text_response(stream, &mut self.buffer)
        };

        match response {
            Some(response) => Ok(response),
            None => {
                self.disconnect();
                Err(FerroError::Network("failed to receive response".into()))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Convenience wrappers
    // -------------------------------------------------------------------------

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let resp = self.execute(&Request::put(key, value))?;
        expect_ok("PUT", resp).map(|_| ())
    }

    pub fn put_with_ttl(&mut self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        let resp = self.execute(&Request::put_ex(key, value, ttl.as_millis() as i64))?;
        expect_ok("PUTEX", resp).map(|_| ())
    }

    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let resp = self.execute(&Request::get(key))?;
        if resp.status == Status::NotFound {
            return Ok(None);
        }
        expect_ok("GET", resp).map(Some)
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        let resp = self.execute(&Request::del(key))?;
        if resp.status == Status::NotFound {
            return Ok(false);
        }
        expect_ok("DEL", resp).map(|_| true)
    }

    pub fn contains(&mut self, key: &[u8]) -> Result<bool> {
        let resp = self.execute(&Request::exists(key))?;
        expect_ok("EXISTS", resp).map(|data| data == b"1")
    }

    pub fn len(&mut self) -> Result<usize> {
        let resp = self.execute(&Request::bare(Command::Size))?;
        let data = expect_ok("SIZE", resp)?;
        String::from_utf8_lossy(&data)
            .parse()
            .map_err(|_| FerroError::Network("SIZE returned a non-numeric count".into()))
    }

    pub fn clear(&mut self) -> Result<()> {
        let resp = self.execute(&Request::bare(Command::Clear))?;
        expect_ok("CLEAR", resp).map(|_| ())
    }

    /// True iff the server answered the ping; never errors.
    pub fn ping(&mut self) -> bool {
        match self.execute(&Request::bare(Command::Ping)) {
            Ok(resp) => resp.status == Status::Ok && resp.data == b"PONG",
            Err(_) => false,
        }
    }

    /// Ask the server to close this connection.
    pub fn quit(&mut self) -> Result<()> {
        let resp = self.execute(&Request::bare(Command::Quit))?;
        if resp.status == Status::Bye {
            self.disconnect();
        }
        Ok(())
    }
}

fn expect_ok(op: &str, resp: Response) -> Result<Vec<u8>> {
    if resp.status == Status::Ok {
        Ok(resp.data)
    } else {
        Err(FerroError::Network(format!(
            "{} failed: {}",
            op,
            String::from_utf8_lossy(&resp.data)
        )))
    }
}

fn read_text_response(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Option<Response> {
    loop {
        if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(text::decode_response(&line));
        }

        let mut chunk = [0u8; READ_CHUNK];
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}

fn read_binary_response(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Option<Response> {
    loop {
        if binary::has_complete_message(buffer) {
            return match binary::decode_response(buffer) {
                Ok(Some((response, consumed))) => {
                    buffer.drain(..consumed);
                    Some(response)
                }
                _ => None,
            };
        }

        let mut chunk = [0u8; READ_CHUNK];
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}
