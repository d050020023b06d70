//! Recent Connection Reader
//!
//! Keeps only the newest datagram. Suited to telemetry-style streams where a
//! stale value is worse than a dropped one.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::datagram::NetDatagram;
use crate::error::Result;
use crate::network::ConnectionManager;

use super::{ConnectionReader, DatagramHandler};

/// Single retained slot, overwritten by every arrival
#[derive(Default)]
struct RecentSlot {
    latest: Mutex<Option<NetDatagram>>,
}

impl DatagramHandler for RecentSlot {
    fn receive_datagram(&self, datagram: NetDatagram) {
        if self.latest.lock().replace(datagram).is_some() {
            tracing::trace!("Recent reader overwrote an unread datagram");
        }
    }
}

/// Reader with one dedicated worker and a one-datagram mailbox
pub struct RecentConnectionReader {
    reader: ConnectionReader,
    slot: Arc<RecentSlot>,
}

impl RecentConnectionReader {
    pub fn new(manager: &Arc<ConnectionManager>) -> Result<Self> {
        let slot = Arc::new(RecentSlot::default());
        let reader = ConnectionReader::new(manager, 1, Arc::clone(&slot) as Arc<dyn DatagramHandler>)?;
        Ok(Self { reader, slot })
    }

    /// True if a datagram has arrived since the last `get_data`
    pub fn data_available(&self) -> bool {
        self.slot.latest.lock().is_some()
    }

    /// Take the most recent datagram
    pub fn get_data(&self) -> Option<NetDatagram> {
        self.slot.latest.lock().take()
    }
}

impl Deref for RecentConnectionReader {
    type Target = ConnectionReader;

    fn deref(&self) -> &ConnectionReader {
        &self.reader
    }
}
