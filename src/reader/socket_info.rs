//! Per-socket bookkeeping for the reader engine

use std::sync::Arc;

use crate::network::Connection;

/// Where a monitored socket stands with respect to the multiplex wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Eligible for the next wait
    Idle,

    /// Claimed by exactly one worker; excluded from the wait
    Busy,

    /// Permanently excluded, pending removal
    Error,
}

/// One (connection, reader) pairing
pub(crate) struct SocketInfo {
    pub(crate) connection: Arc<Connection>,
    pub(crate) state: SocketState,

    /// Currently registered with the OS poller
    pub(crate) registered: bool,

    /// Removal requested; the entry goes away once it is no longer Busy
    pub(crate) removed: bool,
}

impl SocketInfo {
    pub(crate) fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            state: SocketState::Idle,
            registered: false,
            removed: false,
        }
    }

    /// True if this entry monitors exactly `connection`
    pub(crate) fn is(&self, connection: &Connection) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.connection), connection)
    }

    /// Should be part of the wait set after the next rebuild
    pub(crate) fn wants_wait(&self) -> bool {
        self.state == SocketState::Idle && !self.removed
    }

    /// Can be dropped at the next rebuild
    pub(crate) fn is_disposable(&self) -> bool {
        self.removed && self.state != SocketState::Busy
    }
}
