//! Blocking bounded queue
//!
//! Producers call `insert`, worker threads block in `extract`. `shutdown`
//! wakes every waiter; workers drain what is left and then see `None`.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::{NetError, Result};

struct QueueState<T> {
    items: VecDeque<T>,
    max_size: usize,
    shutdown: bool,
}

/// Bounded multi-producer / multi-consumer queue
pub struct DatagramQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Signalled when an item is inserted or on shutdown
    not_empty: Condvar,

    /// Signalled when an item is extracted or on shutdown
    not_full: Condvar,
}

impl<T> DatagramQueue<T> {
    /// Create a queue holding at most `max_size` items
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                max_size,
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Add an item
    ///
    /// With `block` false a full queue fails immediately with `QueueFull`;
    /// with `block` true the caller waits for space. Inserting into a queue
    /// that has been shut down fails with `QueueShutdown`.
    pub fn insert(&self, item: T, block: bool) -> Result<()> {
        let mut state = self.state.lock();

        loop {
            if state.shutdown {
                return Err(NetError::QueueShutdown);
            }
            if state.items.len() < state.max_size {
                break;
            }
            if !block {
                return Err(NetError::QueueFull(state.max_size));
            }
            self.not_full.wait(&mut state);
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking until one is available
    ///
    /// Returns `None` once the queue is shut down and empty.
    pub fn extract(&self) -> Option<T> {
        let mut state = self.state.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.shutdown {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Remove the oldest item without blocking
    pub fn try_extract(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Stop accepting inserts and wake every waiter
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.state.lock().max_size
    }

    /// Change the capacity; items already queued are kept
    pub fn set_max_size(&self, max_size: usize) {
        self.state.lock().max_size = max_size;
        self.not_full.notify_all();
    }
}
