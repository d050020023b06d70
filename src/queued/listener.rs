//! Queued Connection Listener

use std::ops::Deref;
use std::sync::Arc;

use crate::address::NetAddress;
use crate::error::Result;
use crate::network::{Connection, ConnectionManager};
use crate::queue::QueuedReturn;
use crate::reader::{ConnectionListener, ListenerHandler};

/// A connection accepted by a rendezvous socket
#[derive(Debug, Clone)]
pub struct NewConnection {
    /// The listening socket that accepted it
    pub rendezvous: Arc<Connection>,

    /// Peer address
    pub address: NetAddress,

    /// The accepted stream
    pub connection: Arc<Connection>,
}

impl ListenerHandler for QueuedReturn<NewConnection> {
    fn connection_opened(
        &self,
        rendezvous: &Arc<Connection>,
        address: &NetAddress,
        connection: Arc<Connection>,
    ) {
        self.enqueue_thing(NewConnection {
            rendezvous: Arc::clone(rendezvous),
            address: *address,
            connection,
        });
    }
}

/// Listener that queues accepted connections for the application
pub struct QueuedConnectionListener {
    listener: ConnectionListener,
    queue: Arc<QueuedReturn<NewConnection>>,
}

impl QueuedConnectionListener {
    pub fn new(manager: &Arc<ConnectionManager>, num_threads: usize) -> Result<Self> {
        let queue = Arc::new(QueuedReturn::new(manager.config().max_queue_size));
        let listener = ConnectionListener::new(
            manager,
            num_threads,
            Arc::clone(&queue) as Arc<dyn ListenerHandler>,
        )?;
        Ok(Self { listener, queue })
    }

    /// True if an accepted connection is waiting
    pub fn new_connection_available(&self) -> bool {
        self.poll();
        self.queue.thing_available()
    }

    /// Pop the next accepted connection
    pub fn get_new_connection(&self) -> Option<NewConnection> {
        self.queue.get_thing()
    }
}

impl Deref for QueuedConnectionListener {
    type Target = ConnectionListener;

    fn deref(&self) -> &ConnectionListener {
        &self.listener
    }
}
