//! Tests for ConnectionManager and Connection
//!
//! These tests verify:
//! - Opening TCP client, rendezvous and UDP connections
//! - Connect and resolution failures
//! - Closing and ownership checks
//! - Reset reporting (once per connection, never after close)
//! - Queued reset delivery
//! - Reader/writer attachment and manager teardown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framenet::{
    Connection, ConnectionManager, ConnectionReader, ConnectionWriter, NetAddress, NetConfig,
    NetDatagram, NetError, QueuedConnectionManager, ResetCause, ResetHandler, Transport,
};
use parking_lot::Mutex;

// =============================================================================
// Helper Functions
// =============================================================================

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn loopback(port: u16) -> NetAddress {
    let mut address = NetAddress::new();
    address.set_localhost(port);
    address
}

fn local_port(connection: &Arc<Connection>) -> u16 {
    connection.get_address().unwrap().port()
}

/// Open a rendezvous socket on an ephemeral port and return it with its port
fn listen(manager: &ConnectionManager) -> (Arc<Connection>, u16) {
    let rendezvous = manager.open_tcp_server_rendezvous(0, 5).unwrap();
    let port = local_port(&rendezvous);
    (rendezvous, port)
}

#[derive(Default)]
struct RecordingHandler {
    calls: AtomicUsize,
    causes: Mutex<Vec<ResetCause>>,
}

impl ResetHandler for RecordingHandler {
    fn connection_reset(&self, _connection: &Arc<Connection>, cause: ResetCause) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.causes.lock().push(cause);
    }
}

fn ignore_datagrams() -> Arc<dyn framenet::DatagramHandler> {
    Arc::new(|_datagram: NetDatagram| {})
}

// =============================================================================
// Opening Tests
// =============================================================================

#[test]
fn test_open_udp_ephemeral_port() {
    let manager = ConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();

    assert_eq!(udp.transport(), Transport::Udp);
    assert_ne!(local_port(&udp), 0);
    assert!(udp.peer_address().is_none());
    assert_eq!(manager.connection_count(), 1);
}

#[test]
fn test_open_rendezvous() {
    let manager = ConnectionManager::new();
    let (rendezvous, port) = listen(&manager);

    assert_eq!(rendezvous.transport(), Transport::TcpRendezvous);
    assert_ne!(port, 0);
}

#[test]
fn test_open_rendezvous_on_specific_address() {
    let manager = ConnectionManager::new();
    let rendezvous = manager
        .open_tcp_server_rendezvous_addr(&loopback(0), 5)
        .unwrap();

    let address = rendezvous.get_address().unwrap();
    assert_eq!(address.ip_string(), "127.0.0.1");
}

#[test]
fn test_open_tcp_client() {
    let manager = ConnectionManager::new();
    let (_rendezvous, port) = listen(&manager);

    let client = manager
        .open_tcp_client(&loopback(port), CONNECT_TIMEOUT)
        .unwrap();

    assert_eq!(client.transport(), Transport::Tcp);
    assert_eq!(client.peer_address(), Some(loopback(port)));
    assert_eq!(manager.connection_count(), 2);
}

#[test]
fn test_open_tcp_client_by_host() {
    let manager = ConnectionManager::new();
    let (_rendezvous, port) = listen(&manager);

    let client = manager
        .open_tcp_client_host("127.0.0.1", port, CONNECT_TIMEOUT)
        .unwrap();
    assert_eq!(client.peer_address().unwrap().port(), port);
}

#[test]
fn test_open_tcp_client_refused() {
    let manager = ConnectionManager::new();

    // Grab a free port, then release it so nothing listens there
    let port = {
        let (rendezvous, port) = listen(&manager);
        assert!(manager.close_connection(&rendezvous));
        port
    };

    let result = manager.open_tcp_client(&loopback(port), CONNECT_TIMEOUT);
    assert!(matches!(result, Err(NetError::Connect { .. })));
    assert_eq!(manager.connection_count(), 0);
}

#[test]
fn test_open_tcp_client_unresolvable() {
    let manager = ConnectionManager::new();
    let result = manager.open_tcp_client_host("no.such.host.invalid", 80, CONNECT_TIMEOUT);
    assert!(matches!(result, Err(NetError::Resolution(_))));
}

#[test]
fn test_connection_ids_are_unique() {
    let manager = ConnectionManager::new();
    let a = manager.open_udp(0).unwrap();
    let b = manager.open_udp(0).unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a, b);
    assert_eq!(manager.get_connection(a.id()).as_ref(), Some(&a));
    assert_eq!(manager.connections().len(), 2);
}

// =============================================================================
// Closing Tests
// =============================================================================

#[test]
fn test_close_connection() {
    let manager = ConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();

    assert!(manager.close_connection(&udp));
    assert!(udp.is_closed());
    assert_eq!(manager.connection_count(), 0);
    assert!(manager.get_connection(udp.id()).is_none());

    // Second close is a no-op
    assert!(!manager.close_connection(&udp));
}

#[test]
fn test_close_connection_of_other_manager() {
    let owner = ConnectionManager::new();
    let stranger = ConnectionManager::new();
    let udp = owner.open_udp(0).unwrap();

    assert!(!stranger.close_connection(&udp));
    assert!(!udp.is_closed());
}

#[test]
fn test_send_on_closed_connection() {
    let manager = ConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();
    manager.close_connection(&udp);

    let mut datagram = NetDatagram::default();
    datagram.set_address(loopback(9));
    let result = udp.send_raw_datagram(&datagram);
    assert!(matches!(result, Err(NetError::Closed)));
}

#[test]
fn test_close_releases_udp_port() {
    let manager = ConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();
    let port = local_port(&udp);

    assert!(manager.close_connection(&udp));

    // `udp` is still held here; the port must be free regardless
    let rebound = manager.open_udp(port).unwrap();
    assert_eq!(local_port(&rebound), port);
}

#[test]
fn test_close_releases_rendezvous_port() {
    let manager = ConnectionManager::new();
    let (rendezvous, port) = listen(&manager);

    assert!(manager.close_connection(&rendezvous));

    let addr = loopback(port).socket_addr();
    let result = std::net::TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT);
    assert!(result.is_err(), "closed rendezvous still accepts connections");
}

#[test]
fn test_close_releases_port_while_monitored() {
    let manager = ConnectionManager::new();
    let reader = ConnectionReader::new(&manager, 1, ignore_datagrams()).unwrap();
    let udp = manager.open_udp(0).unwrap();
    let port = local_port(&udp);
    assert!(reader.add_connection(&udp));

    assert!(manager.close_connection(&udp));
    assert!(manager.open_udp(port).is_ok());

    reader.shutdown();
}

#[test]
fn test_closed_connection_has_no_address() {
    let manager = ConnectionManager::new();
    let (rendezvous, _port) = listen(&manager);
    manager.close_connection(&rendezvous);

    assert!(matches!(rendezvous.get_address(), Err(NetError::Closed)));
    assert!(matches!(rendezvous.set_linger(None), Err(NetError::Closed)));
    assert_eq!(rendezvous.transport(), Transport::TcpRendezvous);
}

#[test]
fn test_close_removes_from_reader() {
    let manager = ConnectionManager::new();
    let reader = ConnectionReader::new(&manager, 0, ignore_datagrams()).unwrap();
    let udp = manager.open_udp(0).unwrap();

    assert!(reader.add_connection(&udp));
    assert!(reader.is_connection_ok(&udp));

    manager.close_connection(&udp);
    assert!(!reader.is_connection_ok(&udp));
    assert_eq!(reader.connection_count(), 0);
}

#[test]
fn test_dropping_manager_closes_connections() {
    let manager = ConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();

    drop(manager);
    assert!(udp.is_closed());
    assert!(udp.manager().is_none());
}

// =============================================================================
// Reset Tests
// =============================================================================

#[test]
fn test_reset_forwarded_once() {
    let handler = Arc::new(RecordingHandler::default());
    let manager = ConnectionManager::with_reset_handler(
        NetConfig::default(),
        Arc::clone(&handler) as Arc<dyn ResetHandler>,
    );
    let udp = manager.open_udp(0).unwrap();

    manager.connection_reset(&udp, ResetCause::Closed);
    manager.connection_reset(&udp, ResetCause::Closed);

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.causes.lock().as_slice(), &[ResetCause::Closed]);
    assert!(udp.was_reset());
}

#[test]
fn test_reset_after_close_ignored() {
    let handler = Arc::new(RecordingHandler::default());
    let manager = ConnectionManager::with_reset_handler(
        NetConfig::default(),
        Arc::clone(&handler) as Arc<dyn ResetHandler>,
    );
    let udp = manager.open_udp(0).unwrap();

    manager.close_connection(&udp);
    manager.connection_reset(&udp, ResetCause::Closed);

    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    assert!(!udp.was_reset());
}

#[test]
fn test_queued_manager_reports_reset_once() {
    let manager = QueuedConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();

    assert!(!manager.reset_connection_available());
    manager.connection_reset(&udp, ResetCause::Error(std::io::ErrorKind::ConnectionReset));
    manager.connection_reset(&udp, ResetCause::Closed);

    assert!(manager.reset_connection_available());
    assert_eq!(manager.get_reset_connection(), Some(Arc::clone(&udp)));
    assert!(!manager.reset_connection_available());
    assert!(manager.get_reset_connection().is_none());
}

#[test]
fn test_queued_manager_close_after_reset() {
    let manager = QueuedConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();

    manager.connection_reset(&udp, ResetCause::Closed);
    let reset = manager.get_reset_connection().unwrap();
    assert!(manager.close_connection(&reset));
    assert_eq!(manager.connection_count(), 0);
}

// =============================================================================
// Attachment Tests
// =============================================================================

#[test]
fn test_reader_and_writer_attachment() {
    let manager = ConnectionManager::new();
    assert_eq!(manager.num_readers(), 0);
    assert_eq!(manager.num_writers(), 0);

    let reader = ConnectionReader::new(&manager, 1, ignore_datagrams()).unwrap();
    let writer = ConnectionWriter::new(&manager, 1).unwrap();
    assert_eq!(manager.num_readers(), 1);
    assert_eq!(manager.num_writers(), 1);

    reader.shutdown();
    writer.shutdown();
    assert_eq!(manager.num_readers(), 0);
    assert_eq!(manager.num_writers(), 0);
}

#[test]
fn test_dropping_manager_detaches_writer() {
    let manager = ConnectionManager::new();
    let udp = manager.open_udp(0).unwrap();
    let writer = ConnectionWriter::new(&manager, 0).unwrap();

    drop(manager);
    let result = writer.send_to(&framenet::Datagram::from_slice(b"x"), &udp, &loopback(9));
    assert!(matches!(result, Err(NetError::Closed)));
    assert!(writer.manager().is_none());
}

// =============================================================================
// Socket Option Tests
// =============================================================================

#[test]
fn test_socket_options() {
    let manager = ConnectionManager::new();
    let (_rendezvous, port) = listen(&manager);
    let client = manager
        .open_tcp_client(&loopback(port), CONNECT_TIMEOUT)
        .unwrap();
    let udp = manager.open_udp(0).unwrap();

    client.set_no_delay(false).unwrap();
    client.set_keep_alive(true).unwrap();
    client.set_linger(Some(Duration::from_secs(1))).unwrap();
    client.set_recv_buffer_size(64 * 1024).unwrap();
    client.set_send_buffer_size(64 * 1024).unwrap();
    client.set_ip_time_to_live(32).unwrap();
    udp.set_reuse_addr(true).unwrap();

    assert!(matches!(
        udp.set_no_delay(true),
        Err(NetError::WrongTransport(_))
    ));
}
