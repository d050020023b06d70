//! Error types for framenet
//!
//! Provides a unified error type for all operations, plus helpers that
//! classify raw socket errors into the reset / transient / fatal buckets
//! the reader and writer engines act on.

use std::io;

use thiserror::Error;

/// Result type alias using NetError
pub type Result<T> = std::result::Result<T, NetError>;

/// Unified error type for framenet operations
#[derive(Debug, Error)]
pub enum NetError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Addressing / Connect Errors
    // -------------------------------------------------------------------------
    #[error("Unable to resolve host {0}")]
    Resolution(String),

    #[error("Unable to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("Timed out connecting to {0}")]
    Timeout(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection reset by peer")]
    ConnectionReset,

    #[error("Connection is closed")]
    Closed,

    #[error("Operation not valid on a {0} connection")]
    WrongTransport(&'static str),

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Frame corruption: {0}")]
    FrameCorruption(String),

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Queue Errors
    // -------------------------------------------------------------------------
    #[error("Queue full ({0} items)")]
    QueueFull(usize),

    #[error("Queue has been shut down")]
    QueueShutdown,

    // -------------------------------------------------------------------------
    // Threading / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Unable to spawn worker thread: {0}")]
    ThreadSpawn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// True for errors that mean the peer has gone away.
pub fn is_reset_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// True for errors where the syscall should simply be retried.
pub fn is_transient_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Log an unexpected socket error, aborting the process in strict mode.
pub(crate) fn report_fatal(context: &str, err: &io::Error, abort_on_error: bool) {
    tracing::error!("Unexpected socket error during {}: {}", context, err);
    if abort_on_error {
        std::process::abort();
    }
}
