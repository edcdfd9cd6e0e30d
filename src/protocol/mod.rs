//! Protocol Module
//!
//! One request/response vocabulary shared by two wire framings:
//!
//! - [`text`]: human-readable, LF-terminated lines (`PUT foo bar`).
//! - [`binary`]: length-prefixed frames, fully 8-bit clean.
//!
//! Both encode the same [`Request`] and [`Response`] types; the server
//! picks a framing per connection by peeking at the first byte.

pub mod binary;
pub mod text;

mod types;

pub use types::{Command, Request, Response, Status};
