//! Queue Module
//!
//! Bounded, thread-safe queues that glue the I/O threads to their consumers.
//!
//! ## Types
//! - `DatagramQueue`: blocking producer/consumer queue (mutex + condvar)
//!   feeding writer worker threads
//! - `QueuedReturn`: non-blocking FIFO of results (datagrams, new or reset
//!   connections) polled by application code
//!
//! Both reject inserts once they reach their configured capacity.

mod datagram_queue;
mod queued_return;

pub use datagram_queue::DatagramQueue;
pub use queued_return::QueuedReturn;
