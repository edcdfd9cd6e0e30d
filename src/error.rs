//! Error types for FerroKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using FerroError
pub type Result<T> = std::result::Result<T, FerroError>;

/// Unified error type for FerroKV operations
#[derive(Debug, Error)]
pub enum FerroError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // File Corruption
    // -------------------------------------------------------------------------
    /// Bad magic, bad version, or a short read where tail tolerance does
    /// not apply. Fatal at the call site.
    #[error("corrupt file: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),
}
