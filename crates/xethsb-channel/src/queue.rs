//! Outbound frame queue shared by event producers and the TX worker.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::warn;

use crate::counters::Counters;

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Bytes>,
    /// True while a controller is connected.
    open: bool,
}

/// FIFO of encoded frames awaiting transmission.
///
/// Producers append at the tail. The TX worker pops from the head and
/// returns a frame to the head when the socket is momentarily full, so
/// ordering survives retries. While no controller is connected the queue
/// is closed and appends are dropped.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    counters: Arc<Counters>,
}

impl OutboundQueue {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            counters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_len(&self, state: &QueueState) {
        self.counters.queued.set(state.entries.len() as u64);
    }

    /// Accept appends from producers.
    pub(crate) fn open(&self) {
        self.lock().open = true;
    }

    /// Returns true while a controller is connected.
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Append a frame. Returns false if it was dropped for want of a
    /// connected controller.
    pub fn push_back(&self, frame: Bytes) -> bool {
        let mut state = self.lock();
        if !state.open {
            self.counters.dropped.inc();
            return false;
        }
        state.entries.push_back(frame);
        self.publish_len(&state);
        true
    }

    /// Return a frame to the head after a transient send failure.
    pub(crate) fn push_front(&self, frame: Bytes) {
        let mut state = self.lock();
        state.entries.push_front(frame);
        self.publish_len(&state);
    }

    pub(crate) fn pop_front(&self) -> Option<Bytes> {
        let mut state = self.lock();
        let frame = state.entries.pop_front();
        if frame.is_some() {
            self.publish_len(&state);
        }
        frame
    }

    /// Close the queue and discard everything in it. Returns the number
    /// of frames discarded.
    pub(crate) fn drain_all(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            state.open = false;
            let n = state.entries.len();
            state.entries.clear();
            self.publish_len(&state);
            n
        };
        let queued = self.counters.queued.get();
        if queued != 0 {
            warn!(queued, "outbound queue gauge nonzero after drain");
        }
        discarded
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
