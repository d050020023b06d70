//! Tests for NetAddress
//!
//! These tests verify:
//! - Wildcard, loopback and broadcast setters
//! - Host resolution and failure handling
//! - Accessors and equality/hashing

use std::collections::HashSet;
use std::net::SocketAddr;

use framenet::{NetAddress, NetError};

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_default_is_any() {
    let address = NetAddress::new();
    assert!(address.is_any());
    assert_eq!(address.port(), 0);
    assert_eq!(address, NetAddress::default());
}

#[test]
fn test_set_any() {
    let mut address = NetAddress::new();
    address.set_any(8080);
    assert!(address.is_any());
    assert_eq!(address.port(), 8080);
    assert_eq!(address.ip_string(), "0.0.0.0");
}

#[test]
fn test_set_localhost() {
    let mut address = NetAddress::new();
    address.set_localhost(9000);
    assert!(!address.is_any());
    assert_eq!(address.ip_string(), "127.0.0.1");
    assert_eq!(address.ip_u32(), 0x7F00_0001);
    assert_eq!(address.to_string(), "127.0.0.1:9000");
}

#[test]
fn test_set_broadcast() {
    let mut address = NetAddress::new();
    address.set_broadcast(5000);
    assert_eq!(address.ip_u32(), 0xFFFF_FFFF);
    assert_eq!(address.port(), 5000);
}

#[test]
fn test_from_socket_addr() {
    let addr: SocketAddr = "10.1.2.3:4567".parse().unwrap();
    let address = NetAddress::from(addr);
    assert_eq!(address.socket_addr(), addr);
    assert_eq!(SocketAddr::from(address), addr);
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_set_host_literal() {
    let mut address = NetAddress::new();
    address.set_host("192.168.1.20", 80).unwrap();
    assert_eq!(address.ip_string(), "192.168.1.20");
    assert_eq!(address.port(), 80);
}

#[test]
fn test_resolve_localhost_prefers_ipv4() {
    let address = NetAddress::resolve("localhost", 1234).unwrap();
    assert_eq!(address.port(), 1234);
    assert!(address.socket_addr().is_ipv4() || address.socket_addr().is_ipv6());
}

#[test]
fn test_set_host_failure_clears() {
    let mut address = NetAddress::new();
    address.set_localhost(1000);

    let result = address.set_host("no.such.host.invalid", 80);
    assert!(matches!(result, Err(NetError::Resolution(_))));
    assert!(address.is_any());
    assert_eq!(address.port(), 0);
}

// =============================================================================
// Accessor Tests
// =============================================================================

#[test]
fn test_ip_components() {
    let address = NetAddress::from("10.20.30.40:1".parse::<SocketAddr>().unwrap());
    assert_eq!(address.ip_component(0), 10);
    assert_eq!(address.ip_component(1), 20);
    assert_eq!(address.ip_component(2), 30);
    assert_eq!(address.ip_component(3), 40);
    assert_eq!(address.ip_component(4), 0);
}

#[test]
fn test_set_port_keeps_ip() {
    let mut address = NetAddress::new();
    address.set_localhost(1);
    address.set_port(2);
    assert_eq!(address.ip_string(), "127.0.0.1");
    assert_eq!(address.port(), 2);
}

#[test]
fn test_clear() {
    let mut address = NetAddress::new();
    address.set_localhost(1);
    address.clear();
    assert_eq!(address, NetAddress::new());
}

#[test]
fn test_usable_as_set_key() {
    let mut a = NetAddress::new();
    a.set_localhost(1);
    let mut b = NetAddress::new();
    b.set_localhost(1);
    let mut c = NetAddress::new();
    c.set_localhost(2);

    let set: HashSet<NetAddress> = [a, b, c].into_iter().collect();
    assert_eq!(set.len(), 2);
}
