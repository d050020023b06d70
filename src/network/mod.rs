//! Network Module
//!
//! Sockets and their lifecycle.
//!
//! ## Architecture
//! - `Connection` wraps exactly one OS socket and serializes its writes
//! - `ConnectionManager` opens, tracks and closes connections, and routes
//!   reset notifications from readers and writers to a `ResetHandler`
//! - Readers and writers hold connections by `Arc`; only the manager closes
//!   them

mod connection;
mod manager;

pub use connection::{Connection, ConnectionId, Transport};
pub use manager::{ConnectionManager, ResetCause, ResetHandler};

pub(crate) use connection::Socket;
