//! # framenet
//!
//! A concurrent networking core for message-oriented applications:
//! - Length-prefixed TCP framing and checksummed UDP framing
//! - A manager that owns every socket and reports peer resets
//! - Multiplexed readers and writers, in polling or thread-pooled mode
//! - Queued consumers for single-threaded applications
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application                              │
//! │      (QueuedConnectionReader / Listener / Manager)           │
//! └───────────┬──────────────────────────────────┬──────────────┘
//!             │ get_data / send                  │ get_reset_connection
//! ┌───────────▼───────────┐          ┌───────────▼──────────────┐
//! │   ConnectionReader    │          │   ConnectionWriter        │
//! │ (poll or worker pool) │          │ (immediate or queued)     │
//! └───────────┬───────────┘          └───────────┬──────────────┘
//!             │                                  │
//! ┌───────────▼──────────────────────────────────▼──────────────┐
//! │                  ConnectionManager                           │
//! │          (owns connections, routes resets)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │  Connection   │
//!               │ (TCP / UDP)   │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod address;
pub mod datagram;
pub mod framing;
pub mod queue;
pub mod network;
pub mod reader;
pub mod writer;
pub mod queued;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use address::NetAddress;
pub use config::NetConfig;
pub use datagram::{Datagram, DatagramIterator, NetDatagram};
pub use error::{NetError, Result};
pub use framing::HeaderWidth;
pub use network::{Connection, ConnectionId, ConnectionManager, ResetCause, ResetHandler, Transport};
pub use queued::{NewConnection, QueuedConnectionListener, QueuedConnectionManager, QueuedConnectionReader};
pub use reader::{
    ConnectionListener, ConnectionReader, DatagramHandler, ListenerHandler, RecentConnectionReader,
    SocketState,
};
pub use writer::ConnectionWriter;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of framenet
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
