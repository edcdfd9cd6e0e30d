//! # FerroKV
//!
//! A persistent key-value store served over TCP, with:
//! - Two interchangeable storage backends behind one trait
//! - Write-Ahead Logging plus periodic snapshots (memory backend)
//! - A log-structured data file with compaction (disk backend)
//! - Text and binary wire protocols on the same port, auto-detected
//! - TTL expiry against an injectable clock
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │        (accept thread + one worker per connection)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  auto-detect: text | binary framing
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Request Dispatcher                          │
//! │            (Command → store operation)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Arc<dyn Store>
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ MemoryStore │          │  DiskStore  │
//!   │ WAL + snap  │          │ log + index │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;

pub mod clock;
pub mod io;
pub mod network;
pub mod protocol;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use clock::{Clock, MockClock, SystemClock};
pub use error::{FerroError, Result};
pub use network::{Client, ClientOptions, Server, ServerOptions};
pub use protocol::{Command, Request, Response, Status};
pub use store::{DiskStore, DiskStoreOptions, MemoryStore, MemoryStoreOptions, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FerroKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
