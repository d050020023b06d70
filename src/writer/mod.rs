//! Writer Module
//!
//! Outbound datagrams, sent either synchronously on the caller's thread or
//! by a pool of worker threads draining a bounded queue.
//!
//! ## Responsibilities
//! - Validate sends against the connection's transport and size limits
//! - Frame payloads (or pass them raw) and write them through the
//!   connection's serialized write path
//! - Apply backpressure: a full queue rejects, or blocks in blocking mode

mod connection_writer;

pub use connection_writer::ConnectionWriter;

pub(crate) use connection_writer::WriterShared;
