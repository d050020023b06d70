//! Queued Connection Reader
//!
//! Buffers received datagrams for the application, optionally holding each
//! one back for a random interval to simulate a slow network.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::datagram::NetDatagram;
use crate::error::Result;
use crate::network::ConnectionManager;
use crate::queue::QueuedReturn;
use crate::reader::{ConnectionReader, DatagramHandler};

/// Datagrams held back by the delay simulation, ordered by release time
struct DelayState {
    min: Duration,
    max: Duration,
    held: VecDeque<(Instant, NetDatagram)>,
}

impl DelayState {
    fn hold(&mut self, datagram: NetDatagram) {
        let span = self.max.saturating_sub(self.min).as_nanos() as u64;
        let extra = if span == 0 {
            0
        } else {
            rand::rng().random_range(0..span)
        };
        let release = Instant::now() + self.min + Duration::from_nanos(extra);

        let at = self.held.partition_point(|(t, _)| *t <= release);
        self.held.insert(at, (release, datagram));
    }
}

struct DatagramInbox {
    fifo: QueuedReturn<NetDatagram>,
    delay: Mutex<Option<DelayState>>,
}

impl DatagramInbox {
    /// Move every held datagram whose time has come into the FIFO
    fn release_due(&self) {
        let mut delay = self.delay.lock();
        let Some(state) = delay.as_mut() else {
            return;
        };

        let now = Instant::now();
        while state.held.front().is_some_and(|(t, _)| *t <= now) {
            if let Some((_, datagram)) = state.held.pop_front() {
                self.fifo.enqueue_thing(datagram);
            }
        }
    }
}

impl DatagramHandler for DatagramInbox {
    fn receive_datagram(&self, datagram: NetDatagram) {
        {
            let mut delay = self.delay.lock();
            if let Some(state) = delay.as_mut() {
                state.hold(datagram);
                return;
            }
        }
        self.fifo.enqueue_thing(datagram);
    }
}

/// Reader that queues every datagram for the application
///
/// In polling mode (`num_threads == 0`), `data_available` also services the
/// sockets, so a plain poll-then-pop loop is all the application needs.
pub struct QueuedConnectionReader {
    reader: ConnectionReader,
    inbox: Arc<DatagramInbox>,
}

impl QueuedConnectionReader {
    pub fn new(manager: &Arc<ConnectionManager>, num_threads: usize) -> Result<Self> {
        let inbox = Arc::new(DatagramInbox {
            fifo: QueuedReturn::new(manager.config().max_queue_size),
            delay: Mutex::new(None),
        });
        let reader = ConnectionReader::new(
            manager,
            num_threads,
            Arc::clone(&inbox) as Arc<dyn DatagramHandler>,
        )?;
        Ok(Self { reader, inbox })
    }

    /// True if a datagram is ready to be taken
    pub fn data_available(&self) -> bool {
        self.poll();
        self.inbox.release_due();
        self.inbox.fifo.thing_available()
    }

    /// Pop the oldest datagram
    pub fn get_data(&self) -> Option<NetDatagram> {
        self.inbox.release_due();
        self.inbox.fifo.get_thing()
    }

    /// Hold each newly received datagram for a random time in `[min, max)`
    pub fn start_delay(&self, min: Duration, max: Duration) {
        let (min, max) = if max < min { (max, min) } else { (min, max) };
        let mut delay = self.inbox.delay.lock();
        match delay.as_mut() {
            Some(state) => {
                state.min = min;
                state.max = max;
            }
            None => {
                *delay = Some(DelayState {
                    min,
                    max,
                    held: VecDeque::new(),
                })
            }
        }
        tracing::debug!("Simulating network delay of {:?}..{:?}", min, max);
    }

    /// End the delay simulation, releasing everything still held
    pub fn stop_delay(&self) {
        let Some(state) = self.inbox.delay.lock().take() else {
            return;
        };
        for (_, datagram) in state.held {
            self.inbox.fifo.enqueue_thing(datagram);
        }
    }

    /// Datagrams currently held back by the delay simulation
    pub fn delayed_count(&self) -> usize {
        self.inbox
            .delay
            .lock()
            .as_ref()
            .map(|state| state.held.len())
            .unwrap_or(0)
    }
}

impl Deref for QueuedConnectionReader {
    type Target = ConnectionReader;

    fn deref(&self) -> &ConnectionReader {
        &self.reader
    }
}
