//! Connection Manager
//!
//! Registry of open connections and the central point for opening, closing
//! and reset notification.
//!
//! ## Responsibilities
//! - Open TCP client, TCP rendezvous and UDP connections
//! - Close connections, detaching them from every attached reader first
//! - Receive reset notifications from readers and writers and forward them
//!   to the installed `ResetHandler`
//! - Tell attached readers and writers when the manager goes away

use std::collections::HashMap;
use std::io;
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Type};

use crate::address::NetAddress;
use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::reader::ReaderShared;
use crate::writer::WriterShared;

use super::connection::{Connection, ConnectionId, Socket};

/// Why a connection was reported reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// The peer closed the stream (a receive returned zero bytes)
    Closed,

    /// A reset-class socket error
    Error(io::ErrorKind),
}

/// Hook invoked when a connection is detected reset
///
/// Called from reader and writer threads, at most once per connection.
pub trait ResetHandler: Send + Sync + 'static {
    fn connection_reset(&self, connection: &Arc<Connection>, cause: ResetCause);
}

/// Owns every connection it opens
///
/// ## Concurrency:
/// - `connections`, `readers`, `writers`: each behind its own mutex
/// - No lock is held while calling into readers, writers or the reset handler
pub struct ConnectionManager {
    self_ref: Weak<ConnectionManager>,
    config: NetConfig,

    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    readers: Mutex<Vec<Weak<ReaderShared>>>,
    writers: Mutex<Vec<Weak<WriterShared>>>,

    reset_handler: Option<Arc<dyn ResetHandler>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager with the default config
    pub fn new() -> Arc<Self> {
        Self::with_config(NetConfig::default())
    }

    pub fn with_config(config: NetConfig) -> Arc<Self> {
        Self::build(config, None)
    }

    /// Create a manager whose resets are forwarded to `handler`
    pub fn with_reset_handler(config: NetConfig, handler: Arc<dyn ResetHandler>) -> Arc<Self> {
        Self::build(config, Some(handler))
    }

    fn build(config: NetConfig, reset_handler: Option<Arc<dyn ResetHandler>>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            config,
            connections: Mutex::new(HashMap::new()),
            readers: Mutex::new(Vec::new()),
            writers: Mutex::new(Vec::new()),
            reset_handler,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    // =========================================================================
    // Opening Connections
    // =========================================================================

    /// Connect to a TCP server
    pub fn open_tcp_client(
        &self,
        address: &NetAddress,
        timeout: Duration,
    ) -> Result<Arc<Connection>> {
        let stream = TcpStream::connect_timeout(&address.socket_addr(), timeout).map_err(|e| {
            match e.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                    NetError::Timeout(address.to_string())
                }
                _ => NetError::Connect {
                    addr: address.to_string(),
                    reason: e.to_string(),
                },
            }
        })?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let connection = self.register(Socket::Stream(stream));
        tracing::info!("Opened TCP connection {} to {}", connection.id(), address);
        Ok(connection)
    }

    /// Resolve `host` and connect to it
    pub fn open_tcp_client_host(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Arc<Connection>> {
        let address = NetAddress::resolve(host, port)?;
        self.open_tcp_client(&address, timeout)
    }

    /// Listen for TCP connections on every interface
    pub fn open_tcp_server_rendezvous(&self, port: u16, backlog: u32) -> Result<Arc<Connection>> {
        let mut address = NetAddress::new();
        address.set_any(port);
        self.open_tcp_server_rendezvous_addr(&address, backlog)
    }

    /// Listen for TCP connections on a specific address
    pub fn open_tcp_server_rendezvous_addr(
        &self,
        address: &NetAddress,
        backlog: u32,
    ) -> Result<Arc<Connection>> {
        let addr = address.socket_addr();
        let socket =
            socket2::Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

        // Enable SO_REUSEADDR for quick restart
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog.min(i32::MAX as u32) as i32)?;

        let listener: TcpListener = socket.into();
        let connection = self.register(Socket::Rendezvous(listener));
        tracing::info!(
            "Listening for TCP connections on {} (connection {}, backlog {})",
            connection.get_address().unwrap_or(*address),
            connection.id(),
            backlog
        );
        Ok(connection)
    }

    /// Open a UDP socket bound to `port` on every interface
    pub fn open_udp(&self, port: u16) -> Result<Arc<Connection>> {
        let mut address = NetAddress::new();
        address.set_any(port);
        self.open_udp_addr(&address)
    }

    /// Open a UDP socket bound to a specific address
    pub fn open_udp_addr(&self, address: &NetAddress) -> Result<Arc<Connection>> {
        let socket = UdpSocket::bind(address.socket_addr())?;
        socket.set_broadcast(true)?;

        let connection = self.register(Socket::Datagram(socket));
        tracing::info!(
            "Opened UDP connection {} on {}",
            connection.id(),
            connection.get_address().unwrap_or(*address)
        );
        Ok(connection)
    }

    /// Wrap a stream accepted by a listener
    pub(crate) fn adopt_stream(&self, stream: TcpStream) -> Arc<Connection> {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Unable to disable Nagle on accepted stream: {}", e);
        }
        self.register(Socket::Stream(stream))
    }

    fn register(&self, socket: Socket) -> Arc<Connection> {
        // Bounded receive waits let a worker stuck mid-frame notice shutdown
        if !self.config.poll_timeout.is_zero() {
            let timeout = Some(self.config.poll_timeout);
            let applied = match &socket {
                Socket::Stream(stream) => stream.set_read_timeout(timeout),
                Socket::Datagram(udp) => udp.set_read_timeout(timeout),
                Socket::Rendezvous(_) => Ok(()),
            };
            if let Err(e) = applied {
                tracing::debug!("Unable to set receive timeout: {}", e);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connection = Arc::new(Connection::new(
            id,
            socket,
            self.self_ref.clone(),
            self.config.collect_tcp,
            self.config.collect_tcp_interval,
            self.config.abort_on_error,
        ));
        self.connections.lock().insert(id, Arc::clone(&connection));
        connection
    }

    // =========================================================================
    // Closing / Reset
    // =========================================================================

    /// Close a connection opened by this manager
    ///
    /// The connection is removed from every attached reader before its socket
    /// is shut down. Returns false if this manager does not own it.
    pub fn close_connection(&self, connection: &Arc<Connection>) -> bool {
        let removed = self.connections.lock().remove(&connection.id());
        if removed.is_none() {
            tracing::debug!("Connection {} is not owned by this manager", connection.id());
            return false;
        }

        for reader in self.live_readers() {
            reader.remove_connection(connection);
        }

        if connection.pending_frames() > 0 {
            if let Err(e) = connection.flush() {
                tracing::debug!("Final flush on connection {} failed: {}", connection.id(), e);
            }
        }
        connection.close();
        tracing::info!("Closed connection {}", connection.id());
        true
    }

    /// Called by readers and writers when a connection is found reset
    ///
    /// Records the reset once and forwards it to the reset handler. The
    /// connection stays open until the application closes it.
    pub fn connection_reset(&self, connection: &Arc<Connection>, cause: ResetCause) {
        if connection.is_closed() {
            tracing::debug!("Ignoring reset of closed connection {}", connection.id());
            return;
        }
        if !connection.mark_reset() {
            return;
        }

        match cause {
            ResetCause::Closed => {
                tracing::info!("Lost connection {}: closed by peer", connection.id())
            }
            ResetCause::Error(kind) => {
                tracing::info!("Lost connection {}: {:?}", connection.id(), kind)
            }
        }

        if let Some(handler) = &self.reset_handler {
            handler.connection_reset(connection, cause);
        }
    }

    // =========================================================================
    // Reader / Writer Tracking
    // =========================================================================

    pub(crate) fn attach_reader(&self, reader: Weak<ReaderShared>) {
        let mut readers = self.readers.lock();
        readers.retain(|r| r.strong_count() > 0);
        readers.push(reader);
    }

    pub(crate) fn detach_reader(&self, reader: &Arc<ReaderShared>) {
        self.readers
            .lock()
            .retain(|r| r.strong_count() > 0 && !std::ptr::eq(r.as_ptr(), Arc::as_ptr(reader)));
    }

    pub(crate) fn attach_writer(&self, writer: Weak<WriterShared>) {
        let mut writers = self.writers.lock();
        writers.retain(|w| w.strong_count() > 0);
        writers.push(writer);
    }

    pub(crate) fn detach_writer(&self, writer: &Arc<WriterShared>) {
        self.writers
            .lock()
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), Arc::as_ptr(writer)));
    }

    fn live_readers(&self) -> Vec<Arc<ReaderShared>> {
        self.readers.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of readers currently attached
    pub fn num_readers(&self) -> usize {
        self.live_readers().len()
    }

    /// Number of writers currently attached
    pub fn num_writers(&self) -> usize {
        self.writers.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Snapshot of every open connection
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().values().cloned().collect()
    }

    pub fn get_connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.lock().get(&id).cloned()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let readers: Vec<Arc<ReaderShared>> = self
            .readers
            .get_mut()
            .drain(..)
            .filter_map(|r| r.upgrade())
            .collect();
        for reader in readers {
            reader.manager_closed();
        }

        let writers: Vec<Arc<WriterShared>> = self
            .writers
            .get_mut()
            .drain(..)
            .filter_map(|w| w.upgrade())
            .collect();
        for writer in writers {
            writer.manager_closed();
        }

        let connections: Vec<Arc<Connection>> =
            self.connections.get_mut().drain().map(|(_, c)| c).collect();
        if !connections.is_empty() {
            tracing::debug!("Manager closing {} remaining connections", connections.len());
        }
        for connection in connections {
            connection.close();
        }
    }
}
