//! Connection Writer
//!
//! ## Threading
//! - `num_threads == 0`: immediate mode, `send` writes on the calling thread
//!   and reports the outcome directly
//! - `num_threads > 0`: `send` queues the datagram and returns; workers
//!   extract and write. Failures are logged by the worker, and resets reach
//!   the manager through the connection.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::address::NetAddress;
use crate::datagram::{Datagram, NetDatagram};
use crate::error::{NetError, Result};
use crate::framing::HeaderWidth;
use crate::network::{Connection, ConnectionManager, Transport};
use crate::queue::DatagramQueue;

/// Writer state shared with its workers
pub(crate) struct WriterShared {
    manager: Weak<ConnectionManager>,
    num_threads: usize,
    queue: DatagramQueue<NetDatagram>,

    raw_mode: AtomicBool,
    tcp_header_size: AtomicU8,
    blocking: AtomicBool,
    max_udp_datagram: usize,

    /// Set once the manager has gone away
    detached: AtomicBool,
}

impl WriterShared {
    fn raw_mode(&self) -> bool {
        self.raw_mode.load(Ordering::Acquire)
    }

    fn tcp_header_size(&self) -> HeaderWidth {
        HeaderWidth::from_u8(self.tcp_header_size.load(Ordering::Acquire))
    }

    /// The owning manager is going away; stop accepting sends
    pub(crate) fn manager_closed(&self) {
        self.detached.store(true, Ordering::Release);
        self.queue.shutdown();
        tracing::debug!("Writer detached from its manager");
    }

    fn write(&self, item: &NetDatagram) -> Result<()> {
        let connection = item.connection().ok_or(NetError::Closed)?;
        if self.raw_mode() {
            connection.send_raw_datagram(item)
        } else {
            connection.send_datagram(item, self.tcp_header_size())
        }
    }

    fn worker_loop(self: Arc<Self>, index: usize) {
        tracing::debug!("Writer thread {} started", index);

        while let Some(item) = self.queue.extract() {
            if let Err(e) = self.write(&item) {
                let id = item.connection().map(|c| c.id()).unwrap_or_default();
                match e {
                    NetError::ConnectionReset | NetError::Closed => {
                        tracing::debug!("Dropped datagram for connection {}: {}", id, e)
                    }
                    other => tracing::warn!("Send on connection {} failed: {}", id, other),
                }
            }
        }

        tracing::debug!("Writer thread {} exiting", index);
    }
}

/// Sends datagrams on any connection owned by a manager
pub struct ConnectionWriter {
    shared: Arc<WriterShared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionWriter {
    /// Create a writer with `num_threads` workers (0 for immediate mode)
    pub fn new(manager: &Arc<ConnectionManager>, num_threads: usize) -> Result<Self> {
        let config = manager.config();
        let shared = Arc::new(WriterShared {
            manager: Arc::downgrade(manager),
            num_threads,
            queue: DatagramQueue::new(config.max_write_queue),
            raw_mode: AtomicBool::new(false),
            tcp_header_size: AtomicU8::new(config.tcp_header_size as u8),
            blocking: AtomicBool::new(false),
            max_udp_datagram: config.max_udp_datagram,
            detached: AtomicBool::new(false),
        });
        manager.attach_writer(Arc::downgrade(&shared));

        let mut threads = Vec::with_capacity(num_threads);
        for index in 0..num_threads {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("framenet-writer-{}", index))
                .spawn(move || worker.worker_loop(index));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    shared.queue.shutdown();
                    for handle in threads {
                        let _ = handle.join();
                    }
                    manager.detach_writer(&shared);
                    return Err(NetError::ThreadSpawn(e.to_string()));
                }
            }
        }

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
        })
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send a datagram on a TCP stream
    pub fn send(&self, datagram: &Datagram, connection: &Arc<Connection>) -> Result<()> {
        if connection.transport() != Transport::Tcp {
            return Err(NetError::WrongTransport(connection.transport().name()));
        }

        let width = self.shared.tcp_header_size();
        if !self.shared.raw_mode() && datagram.len() > width.max_payload() {
            tracing::warn!(
                "Datagram of {} bytes does not fit a {}-byte TCP header",
                datagram.len(),
                width.bytes()
            );
            return Err(NetError::PayloadTooLarge {
                len: datagram.len(),
                max: width.max_payload(),
            });
        }

        let address = connection.peer_address().unwrap_or_default();
        self.dispatch(NetDatagram::tagged(
            datagram.clone(),
            Arc::clone(connection),
            address,
        ))
    }

    /// Send a datagram from a UDP socket to `address`
    pub fn send_to(
        &self,
        datagram: &Datagram,
        connection: &Arc<Connection>,
        address: &NetAddress,
    ) -> Result<()> {
        if connection.transport() != Transport::Udp {
            return Err(NetError::WrongTransport(connection.transport().name()));
        }

        if !self.is_valid_for_udp(datagram) {
            tracing::warn!(
                "Attempt to send UDP datagram of {} bytes, maximum is {}",
                datagram.len(),
                self.shared.max_udp_datagram
            );
            return Err(NetError::PayloadTooLarge {
                len: datagram.len(),
                max: self.shared.max_udp_datagram,
            });
        }

        self.dispatch(NetDatagram::tagged(
            datagram.clone(),
            Arc::clone(connection),
            *address,
        ))
    }

    fn dispatch(&self, item: NetDatagram) -> Result<()> {
        if self.shared.detached.load(Ordering::Acquire) {
            return Err(NetError::Closed);
        }

        if self.shared.num_threads == 0 {
            return self.shared.write(&item);
        }

        let block = self.shared.blocking.load(Ordering::Acquire);
        self.shared.queue.insert(item, block)
    }

    /// True if `datagram` fits in a single UDP packet
    pub fn is_valid_for_udp(&self, datagram: &Datagram) -> bool {
        datagram.len() <= self.shared.max_udp_datagram
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn num_threads(&self) -> usize {
        self.shared.num_threads
    }

    /// True if sends are written on the caller's thread
    pub fn is_immediate(&self) -> bool {
        self.shared.num_threads == 0
    }

    /// Make `send` wait for queue space instead of failing
    pub fn set_blocking(&self, blocking: bool) {
        self.shared.blocking.store(blocking, Ordering::Release);
    }

    pub fn is_blocking(&self) -> bool {
        self.shared.blocking.load(Ordering::Acquire)
    }

    pub fn set_max_queue_size(&self, max_size: usize) {
        self.shared.queue.set_max_size(max_size);
    }

    pub fn max_queue_size(&self) -> usize {
        self.shared.queue.max_size()
    }

    /// Datagrams waiting for a worker
    pub fn current_queue_size(&self) -> usize {
        self.shared.queue.len()
    }

    /// Send payloads without any header
    pub fn set_raw_mode(&self, raw_mode: bool) {
        self.shared.raw_mode.store(raw_mode, Ordering::Release);
    }

    pub fn raw_mode(&self) -> bool {
        self.shared.raw_mode()
    }

    pub fn set_tcp_header_size(&self, width: HeaderWidth) {
        self.shared.tcp_header_size.store(width as u8, Ordering::Release);
    }

    pub fn tcp_header_size(&self) -> HeaderWidth {
        self.shared.tcp_header_size()
    }

    pub fn manager(&self) -> Option<Arc<ConnectionManager>> {
        self.shared.manager.upgrade()
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.is_shutdown()
    }

    /// Stop accepting sends, let workers drain the queue, and join them
    pub fn shutdown(&self) {
        let first = !self.shared.queue.is_shutdown();
        self.shared.queue.shutdown();

        let handles = std::mem::take(&mut *self.threads.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Writer thread panicked");
            }
        }

        if first {
            if let Some(manager) = self.shared.manager.upgrade() {
                manager.detach_writer(&self.shared);
            }
            tracing::debug!("Writer shut down");
        }
    }
}

impl Drop for ConnectionWriter {
    fn drop(&mut self) {
        if self.shared.num_threads > 0 && !self.threads.lock().is_empty() && !self.is_shutdown() {
            tracing::error!("Threaded ConnectionWriter dropped without shutdown()");
            debug_assert!(
                thread::panicking(),
                "threaded ConnectionWriter dropped without shutdown()"
            );
        }
        self.shutdown();
    }
}
