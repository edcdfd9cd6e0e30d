//! Network Module
//!
//! TCP server, per-connection protocol drivers, and the client.
//!
//! ## Architecture
//! - Dedicated accept thread, one worker thread per connection
//! - Each worker auto-detects text vs binary from the first byte
//! - Workers dispatch into a shared `Arc<dyn Store>`

mod client;
mod handler;
mod server;

pub use client::{Client, ClientOptions};
pub use server::{Server, ServerOptions};
