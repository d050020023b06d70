//! Bounded result FIFO
//!
//! Background I/O threads push results here; application code polls with
//! `thing_available` and pops with `get_thing`. Nothing ever blocks.

use std::collections::VecDeque;

use parking_lot::Mutex;

struct ReturnState<T> {
    items: VecDeque<T>,
    max_size: usize,

    /// Set after the first overflow so the error is logged once per episode
    overflowed: bool,
}

/// Non-blocking bounded FIFO of results
pub struct QueuedReturn<T> {
    state: Mutex<ReturnState<T>>,
}

impl<T> QueuedReturn<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(ReturnState {
                items: VecDeque::new(),
                max_size,
                overflowed: false,
            }),
        }
    }

    /// True if at least one result is waiting
    pub fn thing_available(&self) -> bool {
        !self.state.lock().items.is_empty()
    }

    /// Pop the oldest result, if any
    pub fn get_thing(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = state.items.pop_front();
        if state.items.len() < state.max_size {
            state.overflowed = false;
        }
        item
    }

    /// Push a result, dropping it if the FIFO is full
    pub fn enqueue_thing(&self, item: T) -> bool {
        let mut state = self.state.lock();
        Self::push(&mut state, item)
    }

    fn push(state: &mut ReturnState<T>, item: T) -> bool {
        if state.items.len() >= state.max_size {
            if !state.overflowed {
                tracing::error!(
                    "Queued results exceeded {} items; dropping new results until drained",
                    state.max_size
                );
                state.overflowed = true;
            }
            return false;
        }
        state.items.push_back(item);
        true
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

    pub fn set_max_size(&self, max_size: usize) {
        self.state.lock().max_size = max_size;
    }
}

impl<T: PartialEq> QueuedReturn<T> {
    /// Push a result unless an equal one is already waiting
    ///
    /// Returns false if the item was a duplicate or the FIFO is full.
    pub fn enqueue_unique_thing(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.items.contains(&item) {
            return false;
        }
        Self::push(&mut state, item)
    }
}
