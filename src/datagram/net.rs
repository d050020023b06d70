//! Network-tagged datagrams

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::address::NetAddress;
use crate::network::Connection;

use super::Datagram;

/// A payload plus the connection and address it came from or is bound for
///
/// Readers fill in the originating connection and peer address; for UDP
/// sends the address is the destination.
#[derive(Debug, Clone, Default)]
pub struct NetDatagram {
    datagram: Datagram,
    connection: Option<Arc<Connection>>,
    address: NetAddress,
}

impl NetDatagram {
    pub fn new(datagram: Datagram) -> Self {
        Self {
            datagram,
            connection: None,
            address: NetAddress::new(),
        }
    }

    /// Tag a payload with its connection and address
    pub fn tagged(datagram: Datagram, connection: Arc<Connection>, address: NetAddress) -> Self {
        Self {
            datagram,
            connection: Some(connection),
            address,
        }
    }

    pub fn datagram(&self) -> &Datagram {
        &self.datagram
    }

    pub fn into_datagram(self) -> Datagram {
        self.datagram
    }

    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: Option<Arc<Connection>>) {
        self.connection = connection;
    }

    pub fn address(&self) -> &NetAddress {
        &self.address
    }

    pub fn set_address(&mut self, address: NetAddress) {
        self.address = address;
    }
}

impl From<Datagram> for NetDatagram {
    fn from(datagram: Datagram) -> Self {
        Self::new(datagram)
    }
}

impl Deref for NetDatagram {
    type Target = Datagram;

    fn deref(&self) -> &Datagram {
        &self.datagram
    }
}

impl DerefMut for NetDatagram {
    fn deref_mut(&mut self) -> &mut Datagram {
        &mut self.datagram
    }
}
