//! Queued Module
//!
//! Concrete consumers that park transport events in a bounded FIFO so the
//! application can pick them up on its own thread with a poll-then-pop pair.
//!
//! ```text
//!   reader threads ──receive_datagram──▶ QueuedReturn ──get_data──▶ app
//!   listener threads ──connection_opened──▶ QueuedReturn ──get_new_connection──▶ app
//!   reader/writer threads ──connection_reset──▶ QueuedReturn ──get_reset_connection──▶ app
//! ```

mod listener;
mod manager;
mod reader;

pub use listener::{NewConnection, QueuedConnectionListener};
pub use manager::QueuedConnectionManager;
pub use reader::QueuedConnectionReader;
