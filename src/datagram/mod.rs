//! Datagram Module
//!
//! Opaque byte payloads moved by the transport.
//!
//! ## Types
//! - `Datagram`: growable payload with typed append helpers
//! - `DatagramIterator`: bounds-checked reader over a payload
//! - `NetDatagram`: payload tagged with its connection and address
//!
//! Multi-byte values written with the `add_*` helpers are little-endian;
//! the `add_be_*` variants write network order. The transport itself never
//! inspects payload contents.

mod payload;
mod net;

pub use payload::{Datagram, DatagramIterator};
pub use net::NetDatagram;
