//! Connection Listener
//!
//! Accepts incoming TCP connections on rendezvous sockets.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::Result;
use crate::network::ConnectionManager;

use super::{ConnectionReader, Dispatch, ListenerHandler};

/// A reader whose ready sockets are rendezvous sockets
///
/// Each ready socket yields one `accept()`; the new stream is wrapped in a
/// connection owned by the manager and passed to the handler. Everything
/// else (threads, polling, add/remove, shutdown) is the reader engine's.
pub struct ConnectionListener {
    reader: ConnectionReader,
}

impl ConnectionListener {
    pub fn new(
        manager: &Arc<ConnectionManager>,
        num_threads: usize,
        handler: Arc<dyn ListenerHandler>,
    ) -> Result<Self> {
        let reader = ConnectionReader::with_dispatch(manager, num_threads, Dispatch::Accept(handler))?;
        Ok(Self { reader })
    }
}

impl Deref for ConnectionListener {
    type Target = ConnectionReader;

    fn deref(&self) -> &ConnectionReader {
        &self.reader
    }
}
