//! Protocol-agnostic request/response vocabulary

/// Command carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Unknown = 0,
    Get = 1,
    Put = 2,
    PutEx = 3,
    Del = 4,
    Exists = 5,
    Size = 6,
    Clear = 7,
    Ping = 8,
    Quit = 9,
}

impl Command {
    /// Decode a wire byte; `None` for values outside the vocabulary.
    pub fn from_u8(byte: u8) -> Option<Command> {
        match byte {
            0 => Some(Command::Unknown),
            1 => Some(Command::Get),
            2 => Some(Command::Put),
            3 => Some(Command::PutEx),
            4 => Some(Command::Del),
            5 => Some(Command::Exists),
            6 => Some(Command::Size),
            7 => Some(Command::Clear),
            8 => Some(Command::Ping),
            9 => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Status carried by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    NotFound = 1,
    Error = 2,
    Bye = 3,
}

impl Status {
    pub fn from_u8(byte: u8) -> Option<Status> {
        match byte {
            0 => Some(Status::Ok),
            1 => Some(Status::NotFound),
            2 => Some(Status::Error),
            3 => Some(Status::Bye),
            _ => None,
        }
    }
}

/// Protocol-agnostic request.
///
/// Fields a command does not use stay at their defaults (empty key/value,
/// zero TTL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub ttl_ms: i64,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            command: Command::Unknown,
            key: Vec::new(),
            value: Vec::new(),
            ttl_ms: 0,
        }
    }
}

impl Request {
    pub fn get(key: impl Into<Vec<u8>>) -> Self {
        Self {
            command: Command::Get,
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            command: Command::Put,
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn put_ex(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, ttl_ms: i64) -> Self {
        Self {
            command: Command::PutEx,
            key: key.into(),
            value: value.into(),
            ttl_ms,
        }
    }

    pub fn del(key: impl Into<Vec<u8>>) -> Self {
        Self {
            command: Command::Del,
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn exists(key: impl Into<Vec<u8>>) -> Self {
        Self {
            command: Command::Exists,
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn bare(command: Command) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }
}

/// Protocol-agnostic response. `close_connection` is set iff the status
/// is [`Status::Bye`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub data: Vec<u8>,
    pub close_connection: bool,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            data: Vec::new(),
            close_connection: false,
        }
    }

    pub fn ok_with(data: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            data: data.into(),
            close_connection: false,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            data: Vec::new(),
            close_connection: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: message.into().into_bytes(),
            close_connection: false,
        }
    }

    pub fn bye() -> Self {
        Self {
            status: Status::Bye,
            data: Vec::new(),
            close_connection: true,
        }
    }
}
