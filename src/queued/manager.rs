//! Queued Connection Manager
//!
//! A manager whose reset notifications are queued for the application.

use std::ops::Deref;
use std::sync::Arc;

use crate::config::NetConfig;
use crate::network::{Connection, ConnectionManager, ResetCause, ResetHandler};
use crate::queue::QueuedReturn;

/// Pending resets; a connection already waiting is not queued twice
struct ResetQueue {
    resets: QueuedReturn<Arc<Connection>>,
}

impl ResetHandler for ResetQueue {
    fn connection_reset(&self, connection: &Arc<Connection>, _cause: ResetCause) {
        self.resets.enqueue_unique_thing(Arc::clone(connection));
    }
}

/// Connection manager that surfaces resets as pollable events
///
/// The application typically drains `get_reset_connection` once per frame
/// and calls `close_connection` on each.
pub struct QueuedConnectionManager {
    manager: Arc<ConnectionManager>,
    queue: Arc<ResetQueue>,
}

impl QueuedConnectionManager {
    pub fn new() -> Self {
        Self::with_config(NetConfig::default())
    }

    pub fn with_config(config: NetConfig) -> Self {
        let queue = Arc::new(ResetQueue {
            resets: QueuedReturn::new(config.max_queue_size),
        });
        let manager = ConnectionManager::with_reset_handler(
            config,
            Arc::clone(&queue) as Arc<dyn ResetHandler>,
        );
        Self { manager, queue }
    }

    /// The underlying manager, for constructing readers and writers
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// True if a reset connection is waiting
    pub fn reset_connection_available(&self) -> bool {
        self.queue.resets.thing_available()
    }

    /// Pop the next reset connection
    pub fn get_reset_connection(&self) -> Option<Arc<Connection>> {
        self.queue.resets.get_thing()
    }
}

impl Default for QueuedConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for QueuedConnectionManager {
    type Target = ConnectionManager;

    fn deref(&self) -> &ConnectionManager {
        &self.manager
    }
}
