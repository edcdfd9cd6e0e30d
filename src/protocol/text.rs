//! Text protocol codec
//!
//! Line-oriented framing: one request or response per LF-terminated line,
//! tokens separated by spaces. 8-bit clean except that values containing
//! `\n` (or leading/trailing spaces) cannot be round-tripped; the binary
//! protocol exists for those.
//!
//! ## Request Grammar
//! ```text
//! GET key            PUT key value...      PUTEX key ttl_ms value...
//! DEL key            EXISTS key            SIZE | CLEAR | PING | QUIT
//! ```
//! Aliases on decode: SET=PUT, SETEX=PUTEX, DELETE/REMOVE=DEL,
//! CONTAINS=EXISTS, COUNT=SIZE, EXIT=QUIT. The command token is
//! case-insensitive.
//!
//! ## Response Grammar
//! ```text
//! OK[ data]\n   NOT_FOUND\n   ERROR message\n   BYE\n
//! ```

use super::{Command, Request, Response, Status};

/// Encode a request as one LF-terminated line.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut line: Vec<u8> = command_token(req.command).as_bytes().to_vec();

    match req.command {
        Command::Get | Command::Del | Command::Exists => {
            line.push(b' ');
            line.extend_from_slice(&req.key);
        }
        Command::Put => {
            line.push(b' ');
            line.extend_from_slice(&req.key);
            line.push(b' ');
            line.extend_from_slice(&req.value);
        }
        Command::PutEx => {
            line.push(b' ');
            line.extend_from_slice(&req.key);
            line.push(b' ');
            line.extend_from_slice(req.ttl_ms.to_string().as_bytes());
            line.push(b' ');
            line.extend_from_slice(&req.value);
        }
        _ => {}
    }

    line.push(b'\n');
    line
}

/// Encode a response as one LF-terminated line.
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut line: Vec<u8> = Vec::new();

    match resp.status {
        Status::Ok => {
            line.extend_from_slice(b"OK");
            if !resp.data.is_empty() {
                line.push(b' ');
                line.extend_from_slice(&resp.data);
            }
        }
        Status::NotFound => line.extend_from_slice(b"NOT_FOUND"),
        Status::Error => {
            line.extend_from_slice(b"ERROR ");
            line.extend_from_slice(&resp.data);
        }
        Status::Bye => line.extend_from_slice(b"BYE"),
    }

    line.push(b'\n');
    line
}

/// Decode one request line (without the trailing LF).
///
/// A recognized command with a malformed payload (missing key, bad TTL)
/// degrades to `Command::Unknown` rather than an error; the dispatcher
/// answers those with a usage error.
pub fn decode_request(line: &[u8]) -> Request {
    let mut tokens = line
        .split(|b: &u8| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty());

    let command = match tokens.next() {
        Some(token) => parse_command(token),
        None => return Request::default(),
    };
    let args: Vec<&[u8]> = tokens.collect();

    let mut req = Request {
        command,
        ..Request::default()
    };

    match command {
        Command::Get | Command::Del | Command::Exists => match args.first() {
            Some(key) => req.key = key.to_vec(),
            None => req.command = Command::Unknown,
        },
        Command::Put => {
            if args.len() < 2 {
                req.command = Command::Unknown;
            } else {
                req.key = args[0].to_vec();
                req.value = join_tokens(&args[1..]);
            }
        }
        Command::PutEx => {
            if args.len() < 3 {
                req.command = Command::Unknown;
            } else {
                req.key = args[0].to_vec();
                match parse_i64(args[1]) {
                    Some(ttl_ms) => {
                        req.ttl_ms = ttl_ms;
                        req.value = join_tokens(&args[2..]);
                    }
                    None => req.command = Command::Unknown,
                }
            }
        }
        _ => {}
    }

    req
}

/// Decode one response line (without the trailing LF).
pub fn decode_response(line: &[u8]) -> Response {
    if line == b"OK" {
        return Response::ok();
    }
    if let Some(data) = line.strip_prefix(b"OK ") {
        return Response::ok_with(data);
    }
    if line == b"NOT_FOUND" {
        return Response::not_found();
    }
    if line == b"ERROR" {
        return Response::error("");
    }
    if let Some(msg) = line.strip_prefix(b"ERROR ") {
        return Response {
            status: Status::Error,
            data: msg.to_vec(),
            close_connection: false,
        };
    }
    if line == b"BYE" {
        return Response::bye();
    }
    Response::error(format!(
        "unknown response: {}",
        String::from_utf8_lossy(line)
    ))
}

fn command_token(cmd: Command) -> &'static str {
    match cmd {
        Command::Get => "GET",
        Command::Put => "PUT",
        Command::PutEx => "PUTEX",
        Command::Del => "DEL",
        Command::Exists => "EXISTS",
        Command::Size => "SIZE",
        Command::Clear => "CLEAR",
        Command::Ping => "PING",
        Command::Quit => "QUIT",
        Command::Unknown => "UNKNOWN",
    }
}

fn parse_command(token: &[u8]) -> Command {
    let eq = |name: &str| token.eq_ignore_ascii_case(name.as_bytes());

    if eq("GET") {
        Command::Get
    } else if eq("PUT") || eq("SET") {
        Command::Put
    } else if eq("PUTEX") || eq("SETEX") {
        Command::PutEx
    } else if eq("DEL") || eq("DELETE") || eq("REMOVE") {
        Command::Del
    } else if eq("EXISTS") || eq("CONTAINS") {
        Command::Exists
    } else if eq("SIZE") || eq("COUNT") {
        Command::Size
    } else if eq("CLEAR") {
        Command::Clear
    } else if eq("PING") {
        Command::Ping
    } else if eq("QUIT") || eq("EXIT") {
        Command::Quit
    } else {
        Command::Unknown
    }
}

/// Rejoin value tokens with single spaces (runs of whitespace in the
/// original value collapse; a documented limitation of the text framing).
fn join_tokens(tokens: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        out.extend_from_slice(token);
    }
    out
}

fn parse_i64(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}
