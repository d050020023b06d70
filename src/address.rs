//! Network addresses
//!
//! A resolved (ip, port) endpoint usable as a map or set key.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::error::{NetError, Result};

/// A resolved network endpoint
///
/// Defaults to the wildcard address `0.0.0.0:0`. Equality and hashing are
/// derived from the (ip, port) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetAddress {
    addr: SocketAddr,
}

impl NetAddress {
    /// Create an unspecified (wildcard, port 0) address
    pub fn new() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        }
    }

    /// Resolve a host name into a new address
    pub fn resolve(host: &str, port: u16) -> Result<Self> {
        let mut address = Self::new();
        address.set_host(host, port)?;
        Ok(address)
    }

    /// Point at the wildcard address, for binding on every interface
    pub fn set_any(&mut self, port: u16) {
        self.addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    }

    /// Point at the loopback interface
    pub fn set_localhost(&mut self, port: u16) {
        self.addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    }

    /// Point at the limited broadcast address
    pub fn set_broadcast(&mut self, port: u16) {
        self.addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port);
    }

    /// Resolve `host` and point at it
    ///
    /// IPv4 results are preferred. On failure the address is left unspecified.
    pub fn set_host(&mut self, host: &str, port: u16) -> Result<()> {
        let resolved = match (host, port).to_socket_addrs() {
            Ok(iter) => {
                let candidates: Vec<SocketAddr> = iter.collect();
                candidates
                    .iter()
                    .find(|a| a.is_ipv4())
                    .or_else(|| candidates.first())
                    .copied()
            }
            Err(e) => {
                tracing::debug!("Lookup of {} failed: {}", host, e);
                None
            }
        };

        match resolved {
            Some(addr) => {
                self.addr = addr;
                Ok(())
            }
            None => {
                self.clear();
                Err(NetError::Resolution(host.to_string()))
            }
        }
    }

    /// Reset to the unspecified address
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn set_port(&mut self, port: u16) {
        self.addr.set_port(port);
    }

    /// True if this is the wildcard address
    pub fn is_any(&self) -> bool {
        self.addr.ip().is_unspecified()
    }

    /// The IP portion formatted as text
    pub fn ip_string(&self) -> String {
        self.addr.ip().to_string()
    }

    /// The IPv4 address as a host-order integer (0 for IPv6)
    pub fn ip_u32(&self) -> u32 {
        match self.addr.ip() {
            IpAddr::V4(v4) => u32::from(v4),
            IpAddr::V6(_) => 0,
        }
    }

    /// The n-th octet of an IPv4 address (0 for IPv6 or out-of-range n)
    pub fn ip_component(&self, n: usize) -> u8 {
        match self.addr.ip() {
            IpAddr::V4(v4) => v4.octets().get(n).copied().unwrap_or(0),
            IpAddr::V6(_) => 0,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Default for NetAddress {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SocketAddr> for NetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl From<NetAddress> for SocketAddr {
    fn from(address: NetAddress) -> Self {
        address.addr
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}
