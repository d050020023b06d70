//! Connection
//!
//! One live TCP stream, TCP rendezvous (listening) socket, or UDP socket.

use std::fmt;
use std::io::{self, Write};
use std::net::{Shutdown, TcpListener, TcpStream, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use socket2::SockRef;

use crate::address::NetAddress;
use crate::datagram::NetDatagram;
use crate::error::{is_reset_error, report_fatal, NetError, Result};
use crate::framing::{frame_tcp, frame_udp, HeaderWidth};

use super::manager::{ConnectionManager, ResetCause};

/// Manager-unique connection identifier
pub type ConnectionId = u64;

/// Kind of socket a connection wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Connected TCP stream
    Tcp,

    /// Listening TCP socket awaiting incoming connections
    TcpRendezvous,

    /// UDP socket
    Udp,
}

impl Transport {
    pub fn name(self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::TcpRendezvous => "TCP rendezvous",
            Transport::Udp => "UDP",
        }
    }
}

/// The OS socket owned by a connection
#[derive(Debug)]
pub(crate) enum Socket {
    Stream(TcpStream),
    Rendezvous(TcpListener),
    Datagram(UdpSocket),
}

impl Socket {
    fn sock_ref(&self) -> SockRef<'_> {
        match self {
            Socket::Stream(s) => SockRef::from(s),
            Socket::Rendezvous(l) => SockRef::from(l),
            Socket::Datagram(u) => SockRef::from(u),
        }
    }

    fn transport(&self) -> Transport {
        match self {
            Socket::Stream(_) => Transport::Tcp,
            Socket::Rendezvous(_) => Transport::TcpRendezvous,
            Socket::Datagram(_) => Transport::Udp,
        }
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        match self {
            Socket::Stream(s) => s.as_raw_fd(),
            Socket::Rendezvous(l) => l.as_raw_fd(),
            Socket::Datagram(u) => u.as_raw_fd(),
        }
    }
}

/// Shared access to a connection's socket; `None` once it has been closed
pub(crate) type SocketGuard<'a> = RwLockReadGuard<'a, Option<Socket>>;

/// Write-side state, guarded by the per-connection write lock
struct WriteState {
    /// Frames held back while TCP collection is on
    pending: BytesMut,
    pending_frames: usize,
    last_flush: Instant,
}

/// A live socket shared by readers, writers and the manager
///
/// ## Concurrency:
/// - Reads are only ever performed by the single reader worker that has
///   claimed the socket
/// - Every write takes `write`, so frames from different threads never
///   interleave on the wire
/// - Readers and writers hold a read guard on `socket` while using it;
///   `close` takes the write side and drops the descriptor, so it is
///   released exactly once no matter how many `Arc`s remain
pub struct Connection {
    id: ConnectionId,
    transport: Transport,
    socket: RwLock<Option<Socket>>,

    /// Owning manager, notified of resets
    manager: Weak<ConnectionManager>,

    /// Per-connection write lock
    write: Mutex<WriteState>,

    collect_tcp: AtomicBool,
    collect_tcp_interval: Mutex<Duration>,

    closed: AtomicBool,
    reset: AtomicBool,
    abort_on_error: bool,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        socket: Socket,
        manager: Weak<ConnectionManager>,
        collect_tcp: bool,
        collect_tcp_interval: Duration,
        abort_on_error: bool,
    ) -> Self {
        Self {
            id,
            transport: socket.transport(),
            socket: RwLock::new(Some(socket)),
            manager,
            write: Mutex::new(WriteState {
                pending: BytesMut::new(),
                pending_frames: 0,
                last_flush: Instant::now(),
            }),
            collect_tcp: AtomicBool::new(collect_tcp),
            collect_tcp_interval: Mutex::new(collect_tcp_interval),
            closed: AtomicBool::new(false),
            reset: AtomicBool::new(false),
            abort_on_error,
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The manager that opened this connection, if it is still alive
    pub fn manager(&self) -> Option<Arc<ConnectionManager>> {
        self.manager.upgrade()
    }

    /// Local endpoint the socket is bound to
    pub fn get_address(&self) -> Result<NetAddress> {
        let addr = self.with_socket(|socket| match socket {
            Socket::Stream(s) => s.local_addr(),
            Socket::Rendezvous(l) => l.local_addr(),
            Socket::Datagram(u) => u.local_addr(),
        })?;
        Ok(NetAddress::from(addr))
    }

    /// Remote endpoint of a TCP stream
    pub fn peer_address(&self) -> Option<NetAddress> {
        match self.socket.read().as_ref() {
            Some(Socket::Stream(s)) => s.peer_addr().ok().map(NetAddress::from),
            _ => None,
        }
    }

    pub(crate) fn socket(&self) -> SocketGuard<'_> {
        self.socket.read()
    }

    /// Run `f` against the open socket, or fail with `Closed`
    fn with_socket<R>(&self, f: impl FnOnce(&Socket) -> io::Result<R>) -> Result<R> {
        match self.socket.read().as_ref() {
            Some(socket) => Ok(f(socket)?),
            None => Err(NetError::Closed),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the connection and release its descriptor; later calls are no-ops
    ///
    /// The socket is shut down first so a reader or writer blocked on it
    /// wakes and lets go of its guard. Must not be called while holding a
    /// guard from `socket()`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Some(socket) = self.socket.read().as_ref() {
            if let Err(e) = socket.sock_ref().shutdown(Shutdown::Both) {
                tracing::trace!("Shutdown of connection {}: {}", self.id, e);
            }
        }
        let released = self.socket.write().take();
        drop(released);

        tracing::debug!("Closed {} connection {}", self.transport.name(), self.id);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// True once a reset has been recorded for this connection
    pub fn was_reset(&self) -> bool {
        self.reset.load(Ordering::Acquire)
    }

    /// Record a reset; returns true only for the first one
    pub(crate) fn mark_reset(&self) -> bool {
        !self.reset.swap(true, Ordering::AcqRel)
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Frame and send one datagram
    ///
    /// TCP streams get a length header of `width`; UDP sockets get the
    /// checksum header and are sent to the datagram's address. A reset-class
    /// failure is reported to the manager before returning `ConnectionReset`.
    pub fn send_datagram(self: &Arc<Self>, datagram: &NetDatagram, width: HeaderWidth) -> Result<()> {
        match self.transport {
            Transport::Tcp => {
                let frame = frame_tcp(datagram, width)?;
                self.write_stream(&frame)
            }
            Transport::Udp => self.write_packet(&frame_udp(datagram), datagram.address()),
            Transport::TcpRendezvous => Err(NetError::WrongTransport(self.transport.name())),
        }
    }

    /// Send the payload bytes with no header at all
    pub fn send_raw_datagram(self: &Arc<Self>, datagram: &NetDatagram) -> Result<()> {
        match self.transport {
            Transport::Tcp => self.write_stream(datagram.data()),
            Transport::Udp => self.write_packet(datagram.data(), datagram.address()),
            Transport::TcpRendezvous => Err(NetError::WrongTransport(self.transport.name())),
        }
    }

    /// Write (or collect) TCP bytes under the write lock
    ///
    /// Both the socket guard and the write lock are released before any
    /// failure is reported, so a reset handler is free to close the
    /// connection.
    fn write_stream(self: &Arc<Self>, bytes: &[u8]) -> Result<()> {
        let written = {
            let socket = self.socket.read();
            let Some(Socket::Stream(stream)) = socket.as_ref() else {
                return Err(NetError::Closed);
            };

            let mut state = self.write.lock();
            if self.collect_tcp() {
                state.pending.extend_from_slice(bytes);
                state.pending_frames += 1;
                if state.last_flush.elapsed() < *self.collect_tcp_interval.lock() {
                    return Ok(());
                }
                self.write_pending(&mut state, stream)
            } else {
                let mut writer = stream;
                writer.write_all(bytes)
            }
        };

        written.map_err(|e| self.io_failure(e, "TCP send"))?;
        tracing::trace!("Sent {} bytes on connection {}", bytes.len(), self.id);
        Ok(())
    }

    fn write_packet(self: &Arc<Self>, bytes: &[u8], to: &NetAddress) -> Result<()> {
        if to.is_any() && to.port() == 0 {
            return Err(NetError::Config(
                "UDP send requires a destination address".to_string(),
            ));
        }

        let sent = {
            let socket = self.socket.read();
            let Some(Socket::Datagram(udp)) = socket.as_ref() else {
                return Err(NetError::Closed);
            };
            let _state = self.write.lock();
            udp.send_to(bytes, to.socket_addr())
        }
        .map_err(|e| self.io_failure(e, "UDP send"))?;

        if sent != bytes.len() {
            tracing::warn!(
                "Short UDP send to {}: {} of {} bytes",
                to,
                sent,
                bytes.len()
            );
        }
        tracing::trace!("Sent {} bytes to {} on connection {}", sent, to, self.id);
        Ok(())
    }

    /// Classify a send error, reporting resets to the manager
    fn io_failure(self: &Arc<Self>, err: io::Error, context: &str) -> NetError {
        if self.is_closed() {
            tracing::debug!("{} on closed connection {}: {}", context, self.id, err);
            return NetError::Closed;
        }
        if is_reset_error(&err) {
            tracing::debug!("{} on connection {} failed: {}", context, self.id, err);
            self.notify_reset(ResetCause::Error(err.kind()));
            return NetError::ConnectionReset;
        }
        report_fatal(context, &err, self.abort_on_error);
        NetError::Io(err)
    }

    pub(crate) fn notify_reset(self: &Arc<Self>, cause: ResetCause) {
        match self.manager.upgrade() {
            Some(manager) => manager.connection_reset(self, cause),
            None => {
                self.mark_reset();
            }
        }
    }

    // =========================================================================
    // TCP Write Collection
    // =========================================================================

    /// Batch framed TCP writes instead of sending each immediately
    ///
    /// Turning collection off flushes anything already held.
    pub fn set_collect_tcp(self: &Arc<Self>, enabled: bool) -> Result<()> {
        let was = self.collect_tcp.swap(enabled, Ordering::AcqRel);
        if was && !enabled {
            return self.flush();
        }
        Ok(())
    }

    pub fn collect_tcp(&self) -> bool {
        self.collect_tcp.load(Ordering::Acquire)
    }

    pub fn set_collect_tcp_interval(&self, interval: Duration) {
        *self.collect_tcp_interval.lock() = interval;
    }

    pub fn collect_tcp_interval(&self) -> Duration {
        *self.collect_tcp_interval.lock()
    }

    /// Flush held frames if the collection interval has elapsed
    pub fn consider_flush(self: &Arc<Self>) -> Result<()> {
        let flushed = {
            let socket = self.socket.read();
            let Some(Socket::Stream(stream)) = socket.as_ref() else {
                return Ok(());
            };
            let mut state = self.write.lock();
            if state.pending_frames == 0 || state.last_flush.elapsed() < self.collect_tcp_interval() {
                return Ok(());
            }
            self.write_pending(&mut state, stream)
        };
        flushed.map_err(|e| self.io_failure(e, "TCP flush"))
    }

    /// Send every held frame now
    pub fn flush(self: &Arc<Self>) -> Result<()> {
        let flushed = {
            let socket = self.socket.read();
            let Some(Socket::Stream(stream)) = socket.as_ref() else {
                return Ok(());
            };
            let mut state = self.write.lock();
            self.write_pending(&mut state, stream)
        };
        flushed.map_err(|e| self.io_failure(e, "TCP flush"))
    }

    fn write_pending(&self, state: &mut WriteState, stream: &TcpStream) -> io::Result<()> {
        state.last_flush = Instant::now();
        if state.pending.is_empty() {
            return Ok(());
        }

        let frames = state.pending_frames;
        let bytes = state.pending.split();
        state.pending_frames = 0;

        let mut writer = stream;
        writer.write_all(&bytes)?;
        tracing::trace!(
            "Flushed {} collected frames ({} bytes) on connection {}",
            frames,
            bytes.len(),
            self.id
        );
        Ok(())
    }

    /// Frames currently held back by TCP collection
    pub fn pending_frames(&self) -> usize {
        self.write.lock().pending_frames
    }

    // =========================================================================
    // Socket Options
    // =========================================================================

    /// Enable or disable Nagle's algorithm (TCP streams only)
    pub fn set_no_delay(&self, no_delay: bool) -> Result<()> {
        if self.transport != Transport::Tcp {
            return Err(NetError::WrongTransport(self.transport.name()));
        }
        self.with_socket(|socket| socket.sock_ref().set_tcp_nodelay(no_delay))
    }

    /// Linger on close for up to `linger`, or not at all with `None`
    pub fn set_linger(&self, linger: Option<Duration>) -> Result<()> {
        self.with_socket(|socket| socket.sock_ref().set_linger(linger))
    }

    pub fn set_reuse_addr(&self, reuse: bool) -> Result<()> {
        self.with_socket(|socket| socket.sock_ref().set_reuse_address(reuse))
    }

    pub fn set_keep_alive(&self, keep_alive: bool) -> Result<()> {
        self.with_socket(|socket| socket.sock_ref().set_keepalive(keep_alive))
    }

    pub fn set_recv_buffer_size(&self, size: usize) -> Result<()> {
        self.with_socket(|socket| socket.sock_ref().set_recv_buffer_size(size))
    }

    pub fn set_send_buffer_size(&self, size: usize) -> Result<()> {
        self.with_socket(|socket| socket.sock_ref().set_send_buffer_size(size))
    }

    pub fn set_ip_time_to_live(&self, ttl: u32) -> Result<()> {
        self.with_socket(|socket| match socket {
            Socket::Stream(s) => s.set_ttl(ttl),
            Socket::Rendezvous(l) => l.set_ttl(ttl),
            Socket::Datagram(u) => u.set_ttl(ttl),
        })
    }

    /// True if `manager` is the manager that opened this connection
    pub(crate) fn is_owned_by(&self, manager: &Weak<ConnectionManager>) -> bool {
        Weak::ptr_eq(&self.manager, manager)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl std::hash::Hash for Connection {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("transport", &self.transport())
            .field("closed", &self.is_closed())
            .field("reset", &self.was_reset())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.socket.get_mut().is_some() {
            tracing::trace!("Released socket for unclosed connection {}", self.id);
        }
    }
}
