//! Connection Reader
//!
//! The multiplexing engine: waits for readable sockets, claims one at a time
//! per worker, reassembles frames and dispatches them.
//!
//! ## Threading
//! - `num_threads == 0`: polling mode. The application calls `poll()`, which
//!   performs one non-blocking wait and services every ready socket on the
//!   calling thread.
//! - `num_threads > 0`: each worker takes the poller lock, waits (bounded by
//!   `poll_timeout`), claims one ready socket by marking it Busy, releases
//!   the lock and services the socket outside it.
//!
//! ## Wait-set discipline
//! `add_connection` / `remove_connection` only touch the socket table and set
//! the rebuild flag. Registrations with the OS poller are changed solely by
//! the thread holding the poller lock, so an in-flight wait never races a
//! registration change. A claimed socket is deregistered until its worker
//! finishes with it.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::net::{TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use parking_lot::Mutex;

use crate::address::NetAddress;
use crate::datagram::{Datagram, NetDatagram};
use crate::error::{is_reset_error, is_transient_error, report_fatal, NetError, Result};
use crate::framing::{unframe_udp, HeaderWidth, TcpHeader, UDP_HEADER_SIZE};
use crate::network::{Connection, ConnectionManager, ResetCause, Socket};

use super::socket_info::{SocketInfo, SocketState};
use super::{DatagramHandler, ListenerHandler};

const WAKE_TOKEN: Token = Token(usize::MAX);

/// What a reader does with a ready socket
pub(crate) enum Dispatch {
    /// Decode frames and hand them to a datagram handler
    Datagrams(Arc<dyn DatagramHandler>),

    /// Accept connections on rendezvous sockets
    Accept(Arc<dyn ListenerHandler>),
}

/// Result of servicing one ready socket
enum SocketOutcome {
    /// Socket is healthy; return it to the wait set
    Ready,

    /// Peer went away; report and exclude
    Reset(ResetCause),

    /// Socket cannot be serviced by this reader; exclude without reporting
    Failed,
}

/// A datagram read off a socket (`None` if it was discarded), or the
/// outcome that ended the read
type Received = std::result::Result<Option<NetDatagram>, SocketOutcome>;

struct SocketTable {
    sockets: HashMap<Token, SocketInfo>,
    rebuild: bool,
}

/// State owned by whichever thread holds the poller lock
struct Poller {
    poll: Poll,
    events: Events,

    /// Ready tokens left over from the last wait
    ready: VecDeque<Token>,
}

/// Engine state shared by the reader handle and its workers
pub(crate) struct ReaderShared {
    manager: Weak<ConnectionManager>,
    dispatch: Dispatch,
    num_threads: usize,

    raw_mode: AtomicBool,
    tcp_header_size: AtomicU8,
    max_udp_datagram: usize,
    max_tcp_datagram: usize,
    raw_read_size: usize,
    poll_timeout: Duration,
    abort_on_error: bool,

    /// Monitored sockets; mutated only under this mutex
    table: Mutex<SocketTable>,

    /// Serializes the OS wait: one waiting worker at a time
    poller: Mutex<Poller>,
    waker: Waker,

    shutdown: AtomicBool,
}

/// Connection ids are unique per manager, and a reader only monitors
/// connections of its own manager
fn token_for(connection: &Connection) -> Token {
    Token(connection.id() as usize)
}

fn peer_of(stream: &TcpStream) -> NetAddress {
    stream.peer_addr().map(NetAddress::from).unwrap_or_default()
}

impl ReaderShared {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn wake(&self) {
        if let Err(e) = self.waker.wake() {
            tracing::debug!("Unable to wake reader poller: {}", e);
        }
    }

    fn tcp_header_size(&self) -> HeaderWidth {
        HeaderWidth::from_u8(self.tcp_header_size.load(Ordering::Acquire))
    }

    fn raw_mode(&self) -> bool {
        self.raw_mode.load(Ordering::Acquire)
    }

    // =========================================================================
    // Socket Set
    // =========================================================================

    fn add_connection(&self, connection: &Arc<Connection>) -> bool {
        if self.is_shutdown() {
            return false;
        }
        if !connection.is_owned_by(&self.manager) {
            tracing::warn!(
                "Connection {} belongs to another manager; not monitoring it",
                connection.id()
            );
            return false;
        }

        {
            let mut table = self.table.lock();
            let token = token_for(connection);
            if table.sockets.contains_key(&token) {
                return false;
            }
            table
                .sockets
                .insert(token, SocketInfo::new(Arc::clone(connection)));
            table.rebuild = true;
        }

        tracing::debug!("Reader monitoring connection {}", connection.id());
        self.wake();
        true
    }

    pub(crate) fn remove_connection(&self, connection: &Connection) -> bool {
        {
            let mut table = self.table.lock();
            let Some(info) = table
                .sockets
                .get_mut(&token_for(connection))
                .filter(|info| info.is(connection))
            else {
                return false;
            };
            if info.removed {
                return false;
            }
            info.removed = true;
            table.rebuild = true;
        }

        tracing::debug!("Reader releasing connection {}", connection.id());
        self.wake();
        true
    }

    fn is_connection_ok(&self, connection: &Connection) -> bool {
        self.table
            .lock()
            .sockets
            .get(&token_for(connection))
            .filter(|info| info.is(connection))
            .map(|info| !info.removed && info.state != SocketState::Error)
            .unwrap_or(false)
    }

    fn socket_state(&self, connection: &Connection) -> Option<SocketState> {
        self.table
            .lock()
            .sockets
            .get(&token_for(connection))
            .filter(|info| info.is(connection) && !info.removed)
            .map(|info| info.state)
    }

    fn monitored_count(&self) -> usize {
        self.table
            .lock()
            .sockets
            .values()
            .filter(|info| !info.removed)
            .count()
    }

    /// The owning manager is going away; release every socket
    pub(crate) fn manager_closed(&self) {
        {
            let mut table = self.table.lock();
            for info in table.sockets.values_mut() {
                info.removed = true;
            }
            table.rebuild = true;
        }
        tracing::debug!("Reader detached from its manager");
        self.wake();
    }

    /// Busy → Idle, and schedule the socket to re-enter the wait set
    fn finish_socket(&self, token: Token) {
        {
            let mut table = self.table.lock();
            if let Some(info) = table.sockets.get_mut(&token) {
                if info.state == SocketState::Busy {
                    info.state = SocketState::Idle;
                }
            }
            table.rebuild = true;
        }
        if self.num_threads > 0 {
            self.wake();
        }
    }

    fn fail_socket(&self, token: Token) {
        let mut table = self.table.lock();
        if let Some(info) = table.sockets.get_mut(&token) {
            info.state = SocketState::Error;
        }
        table.rebuild = true;
    }

    // =========================================================================
    // Wait Set (poller lock held)
    // =========================================================================

    /// Bring OS registrations in line with the socket table
    fn rebuild(&self, poll: &Poll) {
        let mut table = self.table.lock();
        if !table.rebuild {
            return;
        }
        table.rebuild = false;

        let registry = poll.registry();
        table.sockets.retain(|token, info| {
            let socket = info.connection.socket();
            let Some(fd) = socket.as_ref().map(Socket::raw_fd) else {
                // A released descriptor has already left the OS wait set
                info.registered = false;
                if !info.removed {
                    info.state = SocketState::Error;
                }
                return !info.is_disposable();
            };

            if info.wants_wait() && !info.registered {
                match registry.register(&mut SourceFd(&fd), *token, Interest::READABLE) {
                    Ok(()) => info.registered = true,
                    Err(e) => {
                        tracing::warn!(
                            "Unable to monitor connection {}: {}",
                            info.connection.id(),
                            e
                        );
                        info.state = SocketState::Error;
                    }
                }
            } else if !info.wants_wait() && info.registered {
                if let Err(e) = registry.deregister(&mut SourceFd(&fd)) {
                    tracing::trace!("Deregister of connection {} failed: {}", info.connection.id(), e);
                }
                info.registered = false;
            }

            !info.is_disposable()
        });
    }

    /// Mark a ready socket Busy and pull it out of the wait set
    fn claim(&self, poll: &Poll, token: Token) -> Option<Arc<Connection>> {
        let mut table = self.table.lock();
        let info = table.sockets.get_mut(&token)?;
        if !info.wants_wait() || !info.registered {
            return None;
        }

        info.registered = false;
        let socket = info.connection.socket();
        let Some(fd) = socket.as_ref().map(Socket::raw_fd) else {
            info.state = SocketState::Error;
            return None;
        };
        if let Err(e) = poll.registry().deregister(&mut SourceFd(&fd)) {
            tracing::trace!("Deregister of connection {} failed: {}", info.connection.id(), e);
        }
        drop(socket);

        info.state = SocketState::Busy;
        Some(Arc::clone(&info.connection))
    }

    fn pop_ready(&self, poller: &mut Poller) -> Option<(Token, Arc<Connection>)> {
        while let Some(token) = poller.ready.pop_front() {
            if let Some(connection) = self.claim(&poller.poll, token) {
                poller.ready.retain(|t| *t != token);
                return Some((token, connection));
            }
        }
        None
    }

    /// One OS wait; ready tokens are appended to the leftover queue
    fn wait(&self, poller: &mut Poller, timeout: Duration) {
        if let Err(e) = poller.poll.poll(&mut poller.events, Some(timeout)) {
            if e.kind() != std::io::ErrorKind::Interrupted {
                report_fatal("multiplex wait", &e, self.abort_on_error);
            }
            return;
        }

        for event in poller.events.iter() {
            let token = event.token();
            if token != WAKE_TOKEN && !poller.ready.contains(&token) {
                poller.ready.push_back(token);
            }
        }
    }

    /// Hand the calling worker its next ready socket, if any turns up
    fn next_ready(&self, poller: &mut Poller) -> Option<(Token, Arc<Connection>)> {
        self.rebuild(&poller.poll);
        if let Some(claimed) = self.pop_ready(poller) {
            return Some(claimed);
        }

        self.wait(poller, self.poll_timeout);
        self.rebuild(&poller.poll);
        self.pop_ready(poller)
    }

    // =========================================================================
    // Workers
    // =========================================================================

    fn worker_loop(self: Arc<Self>, index: usize) {
        tracing::debug!("Reader thread {} started", index);

        while !self.is_shutdown() {
            let claimed = {
                let mut poller = self.poller.lock();
                if self.is_shutdown() {
                    break;
                }
                self.next_ready(&mut poller)
            };

            if let Some((token, connection)) = claimed {
                self.service(token, &connection);
            }
        }

        tracing::debug!("Reader thread {} exiting", index);
    }

    fn poll_once(&self) {
        let claimed: Vec<(Token, Arc<Connection>)> = {
            let mut poller = self.poller.lock();
            self.rebuild(&poller.poll);
            self.wait(&mut poller, Duration::ZERO);

            let mut claimed = Vec::new();
            while let Some(next) = self.pop_ready(&mut poller) {
                claimed.push(next);
            }
            claimed
        };

        for (token, connection) in claimed {
            self.service(token, &connection);
        }
    }

    fn service(&self, token: Token, connection: &Arc<Connection>) {
        let outcome = match &self.dispatch {
            Dispatch::Datagrams(handler) => self.process_incoming_data(connection, handler.as_ref()),
            Dispatch::Accept(handler) => self.process_incoming_accept(connection, handler.as_ref()),
        };

        match outcome {
            SocketOutcome::Ready => self.finish_socket(token),
            SocketOutcome::Reset(cause) => {
                self.fail_socket(token);
                match self.manager.upgrade() {
                    Some(manager) => manager.connection_reset(connection, cause),
                    None => {
                        connection.mark_reset();
                    }
                }
            }
            SocketOutcome::Failed => self.fail_socket(token),
        }
    }

    // =========================================================================
    // Incoming Data
    // =========================================================================

    fn process_incoming_data(
        &self,
        connection: &Arc<Connection>,
        handler: &dyn DatagramHandler,
    ) -> SocketOutcome {
        // The socket guard is released before dispatch, so a handler may
        // close the connection it was handed.
        let socket = connection.socket();
        let received = match socket.as_ref() {
            Some(Socket::Stream(stream)) => {
                let width = self.tcp_header_size();
                if self.raw_mode() || width == HeaderWidth::None {
                    self.read_raw_tcp(connection, stream)
                } else {
                    self.read_tcp_frame(connection, stream, width)
                }
            }
            Some(Socket::Datagram(udp)) => self.read_udp_packet(connection, udp),
            Some(Socket::Rendezvous(_)) => {
                tracing::warn!(
                    "Connection {} is a rendezvous socket; add it to a listener instead",
                    connection.id()
                );
                Err(SocketOutcome::Failed)
            }
            None => Err(SocketOutcome::Failed),
        };
        drop(socket);

        match received {
            Ok(Some(datagram)) => {
                handler.receive_datagram(datagram);
                SocketOutcome::Ready
            }
            Ok(None) => SocketOutcome::Ready,
            Err(outcome) => outcome,
        }
    }

    /// Read until `buf` is full, looping across partial reads
    fn fill(
        &self,
        connection: &Connection,
        mut stream: &TcpStream,
        buf: &mut [u8],
    ) -> std::result::Result<(), SocketOutcome> {
        let mut filled = 0;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(SocketOutcome::Reset(ResetCause::Closed)),
                Ok(n) => filled += n,
                Err(_) if connection.is_closed() => return Err(SocketOutcome::Failed),
                Err(e) if is_transient_error(&e) => {
                    if self.is_shutdown() {
                        return Err(SocketOutcome::Failed);
                    }
                }
                Err(e) if is_reset_error(&e) => {
                    return Err(SocketOutcome::Reset(ResetCause::Error(e.kind())))
                }
                Err(e) => {
                    // The stream has lost frame sync; nothing after this is trustworthy.
                    report_fatal("TCP receive", &e, self.abort_on_error);
                    return Err(SocketOutcome::Reset(ResetCause::Error(e.kind())));
                }
            }
        }
        Ok(())
    }

    fn read_tcp_frame(
        &self,
        connection: &Arc<Connection>,
        stream: &TcpStream,
        width: HeaderWidth,
    ) -> Received {
        let mut header_buf = [0u8; 4];
        let header_bytes = &mut header_buf[..width.bytes()];
        self.fill(connection, stream, header_bytes)?;

        let header = match TcpHeader::decode(header_bytes, width) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!("Discarding frame on connection {}: {}", connection.id(), e);
                return Ok(None);
            }
        };

        // Nothing after an oversized header can be framed again
        if header.datagram_size() > self.max_tcp_datagram {
            let err = NetError::FrameCorruption(format!(
                "header announces {} bytes, limit is {}",
                header.datagram_size(),
                self.max_tcp_datagram
            ));
            tracing::warn!("Dropping connection {}: {}", connection.id(), err);
            return Err(SocketOutcome::Failed);
        }

        let mut payload = BytesMut::zeroed(header.datagram_size());
        self.fill(connection, stream, &mut payload)?;

        let datagram = Datagram::from(payload);
        if !header.verify(&datagram) {
            return Ok(None);
        }

        tracing::trace!(
            "Received {} byte frame on connection {}",
            datagram.len(),
            connection.id()
        );
        let address = peer_of(stream);
        Ok(Some(NetDatagram::tagged(datagram, Arc::clone(connection), address)))
    }

    fn read_raw_tcp(&self, connection: &Arc<Connection>, mut stream: &TcpStream) -> Received {
        let mut buf = BytesMut::zeroed(self.raw_read_size);
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Err(SocketOutcome::Reset(ResetCause::Closed)),
                Ok(n) => {
                    buf.truncate(n);
                    break;
                }
                Err(_) if connection.is_closed() => return Err(SocketOutcome::Failed),
                Err(e) if is_transient_error(&e) => {
                    if self.is_shutdown() {
                        return Err(SocketOutcome::Failed);
                    }
                }
                Err(e) if is_reset_error(&e) => {
                    return Err(SocketOutcome::Reset(ResetCause::Error(e.kind())))
                }
                Err(e) => {
                    report_fatal("raw TCP receive", &e, self.abort_on_error);
                    return Err(SocketOutcome::Reset(ResetCause::Error(e.kind())));
                }
            }
        }

        tracing::trace!("Received {} raw bytes on connection {}", buf.len(), connection.id());
        Ok(Some(NetDatagram::tagged(
            Datagram::from(buf),
            Arc::clone(connection),
            peer_of(stream),
        )))
    }

    fn read_udp_packet(&self, connection: &Arc<Connection>, socket: &UdpSocket) -> Received {
        let raw = self.raw_mode();
        let capacity = if raw {
            self.max_udp_datagram
        } else {
            self.max_udp_datagram + UDP_HEADER_SIZE
        };
        let mut buf = BytesMut::zeroed(capacity);

        let from = loop {
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    buf.truncate(n);
                    break from;
                }
                Err(_) if connection.is_closed() => return Err(SocketOutcome::Failed),
                Err(e) if is_transient_error(&e) => {
                    if self.is_shutdown() {
                        return Err(SocketOutcome::Failed);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    tracing::debug!("ICMP refusal on UDP connection {}: {}", connection.id(), e);
                    return Ok(None);
                }
                Err(e) if is_reset_error(&e) => {
                    return Err(SocketOutcome::Reset(ResetCause::Error(e.kind())))
                }
                Err(e) => {
                    report_fatal("UDP receive", &e, self.abort_on_error);
                    return Ok(None);
                }
            }
        };

        let datagram = if raw {
            Datagram::from(buf)
        } else {
            match unframe_udp(&buf) {
                Ok(datagram) => datagram,
                Err(e) => {
                    tracing::warn!("Discarding UDP packet from {}: {}", from, e);
                    return Ok(None);
                }
            }
        };

        tracing::trace!(
            "Received {} byte packet from {} on connection {}",
            datagram.len(),
            from,
            connection.id()
        );
        Ok(Some(NetDatagram::tagged(
            datagram,
            Arc::clone(connection),
            NetAddress::from(from),
        )))
    }

    // =========================================================================
    // Incoming Connections
    // =========================================================================

    fn process_incoming_accept(
        &self,
        rendezvous: &Arc<Connection>,
        handler: &dyn ListenerHandler,
    ) -> SocketOutcome {
        let socket = rendezvous.socket();
        let accepted = match socket.as_ref() {
            Some(Socket::Rendezvous(listener)) => listener.accept(),
            Some(_) => {
                tracing::warn!(
                    "Connection {} is not a rendezvous socket; a listener cannot service it",
                    rendezvous.id()
                );
                return SocketOutcome::Failed;
            }
            None => return SocketOutcome::Failed,
        };
        drop(socket);

        match accepted {
            Ok((stream, peer)) => {
                let Some(manager) = self.manager.upgrade() else {
                    tracing::debug!("Dropping connection from {}: manager is gone", peer);
                    return SocketOutcome::Ready;
                };

                let connection = manager.adopt_stream(stream);
                let address = NetAddress::from(peer);
                tracing::info!(
                    "Accepted connection {} from {} on rendezvous {}",
                    connection.id(),
                    address,
                    rendezvous.id()
                );
                handler.connection_opened(rendezvous, &address, connection);
                SocketOutcome::Ready
            }
            Err(_) if rendezvous.is_closed() => SocketOutcome::Failed,
            Err(e) if is_transient_error(&e) || e.kind() == std::io::ErrorKind::ConnectionAborted => {
                SocketOutcome::Ready
            }
            Err(e) => {
                report_fatal("accept", &e, self.abort_on_error);
                SocketOutcome::Ready
            }
        }
    }
}

/// Multiplexing reader over any number of connections
///
/// Received frames are handed to a `DatagramHandler`. See the module docs
/// for the threading model. Threaded readers must be shut down before they
/// are dropped.
pub struct ConnectionReader {
    shared: Arc<ReaderShared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionReader {
    /// Create a reader with `num_threads` workers (0 for polling mode)
    pub fn new(
        manager: &Arc<ConnectionManager>,
        num_threads: usize,
        handler: Arc<dyn DatagramHandler>,
    ) -> Result<Self> {
        Self::with_dispatch(manager, num_threads, Dispatch::Datagrams(handler))
    }

    pub(crate) fn with_dispatch(
        manager: &Arc<ConnectionManager>,
        num_threads: usize,
        dispatch: Dispatch,
    ) -> Result<Self> {
        let config = manager.config();
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;

        let shared = Arc::new(ReaderShared {
            manager: Arc::downgrade(manager),
            dispatch,
            num_threads,
            raw_mode: AtomicBool::new(false),
            tcp_header_size: AtomicU8::new(config.tcp_header_size as u8),
            max_udp_datagram: config.max_udp_datagram,
            max_tcp_datagram: config.max_tcp_datagram,
            raw_read_size: config.raw_read_size,
            poll_timeout: config.poll_timeout,
            abort_on_error: config.abort_on_error,
            table: Mutex::new(SocketTable {
                sockets: HashMap::new(),
                rebuild: false,
            }),
            poller: Mutex::new(Poller {
                poll,
                events: Events::with_capacity(config.max_events),
                ready: VecDeque::new(),
            }),
            waker,
            shutdown: AtomicBool::new(false),
        });
        manager.attach_reader(Arc::downgrade(&shared));

        let mut threads = Vec::with_capacity(num_threads);
        for index in 0..num_threads {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("framenet-reader-{}", index))
                .spawn(move || worker.worker_loop(index));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    shared.shutdown.store(true, Ordering::Release);
                    shared.wake();
                    for handle in threads {
                        let _ = handle.join();
                    }
                    manager.detach_reader(&shared);
                    return Err(NetError::ThreadSpawn(e.to_string()));
                }
            }
        }

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
        })
    }

    /// Start monitoring a connection; false if already monitored or shut down
    pub fn add_connection(&self, connection: &Arc<Connection>) -> bool {
        self.shared.add_connection(connection)
    }

    /// Stop monitoring a connection; false if it was not monitored
    pub fn remove_connection(&self, connection: &Arc<Connection>) -> bool {
        self.shared.remove_connection(connection)
    }

    /// True if the connection is monitored and has not failed
    pub fn is_connection_ok(&self, connection: &Arc<Connection>) -> bool {
        self.shared.is_connection_ok(connection)
    }

    /// Current state of a monitored connection
    pub fn socket_state(&self, connection: &Arc<Connection>) -> Option<SocketState> {
        self.shared.socket_state(connection)
    }

    /// Number of connections being monitored
    pub fn connection_count(&self) -> usize {
        self.shared.monitored_count()
    }

    /// Service every ready socket on the calling thread (polling mode only)
    pub fn poll(&self) {
        if self.shared.num_threads > 0 || self.shared.is_shutdown() {
            return;
        }
        self.shared.poll_once();
    }

    pub fn manager(&self) -> Option<Arc<ConnectionManager>> {
        self.shared.manager.upgrade()
    }

    pub fn num_threads(&self) -> usize {
        self.shared.num_threads
    }

    pub fn is_polling(&self) -> bool {
        self.shared.num_threads == 0
    }

    /// Deliver whatever each read returns, without any header processing
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

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Stop every worker and wait for them to exit
    pub fn shutdown(&self) {
        let first = !self.shared.shutdown.swap(true, Ordering::AcqRel);
        self.shared.wake();

        let handles = std::mem::take(&mut *self.threads.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Reader thread panicked");
            }
        }

        if first {
            if let Some(manager) = self.shared.manager.upgrade() {
                manager.detach_reader(&self.shared);
            }
            self.shared.table.lock().sockets.clear();
            tracing::debug!("Reader shut down");
        }
    }
}

impl Drop for ConnectionReader {
    fn drop(&mut self) {
        if self.shared.num_threads > 0 && !self.shared.is_shutdown() {
            tracing::error!("Threaded ConnectionReader dropped without shutdown()");
            debug_assert!(
                thread::panicking(),
                "threaded ConnectionReader dropped without shutdown()"
            );
        }
        self.shutdown();
    }
}
