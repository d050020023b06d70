//! Reader Module
//!
//! Multiplexed, thread-pooled consumption of incoming traffic.
//!
//! ## Types
//! - `ConnectionReader`: decodes frames on monitored sockets and hands each
//!   datagram to a `DatagramHandler`
//! - `ConnectionListener`: the same engine, but accepts connections on
//!   rendezvous sockets and reports them to a `ListenerHandler`
//! - `RecentConnectionReader`: keeps only the latest datagram
//!
//! ## Ordering
//! A socket is serviced to the end of a whole frame before it re-enters the
//! wait set, so frames from one connection arrive in order. Frames from
//! different connections may be delivered in any relative order.

mod engine;
mod listener;
mod recent;
mod socket_info;

pub use engine::ConnectionReader;
pub use listener::ConnectionListener;
pub use recent::RecentConnectionReader;
pub use socket_info::SocketState;

pub(crate) use engine::{Dispatch, ReaderShared};

use std::sync::Arc;

use crate::address::NetAddress;
use crate::datagram::NetDatagram;
use crate::network::Connection;

/// Consumer of decoded datagrams
///
/// Called from reader worker threads (or from `poll()` in polling mode).
pub trait DatagramHandler: Send + Sync + 'static {
    fn receive_datagram(&self, datagram: NetDatagram);
}

impl<F> DatagramHandler for F
where
    F: Fn(NetDatagram) + Send + Sync + 'static,
{
    fn receive_datagram(&self, datagram: NetDatagram) {
        self(datagram)
    }
}

/// Consumer of newly accepted connections
pub trait ListenerHandler: Send + Sync + 'static {
    /// `rendezvous` accepted `connection` from the peer at `address`
    fn connection_opened(
        &self,
        rendezvous: &Arc<Connection>,
        address: &NetAddress,
        connection: Arc<Connection>,
    );
}
