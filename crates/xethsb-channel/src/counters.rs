//! Channel-wide observability counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A single atomic 64-bit counter or gauge.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement, saturating at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Counters shared by the listener, both workers, and event producers.
///
/// `connections` and `queued` are gauges; everything else only grows.
#[derive(Debug, Default)]
pub struct Counters {
    /// Currently connected controllers (0 or 1).
    pub connections: Counter,
    /// Frames currently in the outbound queue.
    pub queued: Counter,
    /// Frames written to the controller.
    pub sent: Counter,
    /// Sends that hit a full socket buffer and were requeued.
    pub retries: Counter,
    /// Frames discarded because no controller was connected.
    pub dropped: Counter,
    /// Frames that could not be allocated.
    pub no_mem: Counter,
    /// TX worker loop iterations.
    pub tx_ticks: Counter,
    /// RX worker loop iterations.
    pub rx_ticks: Counter,
    /// Datagrams received from the controller.
    pub received: Counter,
    /// Received frames that were malformed or unexpected.
    pub invalid: Counter,
    /// Received frames naming an unknown ifindex.
    pub no_dev: Counter,
    /// Received non-native frames handed to the encapsulation layer.
    pub opaque: Counter,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub connections: u64,
    pub queued: u64,
    pub sent: u64,
    pub retries: u64,
    pub dropped: u64,
    pub no_mem: u64,
    pub tx_ticks: u64,
    pub rx_ticks: u64,
    pub received: u64,
    pub invalid: u64,
    pub no_dev: u64,
    pub opaque: u64,
}

impl Counters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            connections: self.connections.get(),
            queued: self.queued.get(),
            sent: self.sent.get(),
            retries: self.retries.get(),
            dropped: self.dropped.get(),
            no_mem: self.no_mem.get(),
            tx_ticks: self.tx_ticks.get(),
            rx_ticks: self.rx_ticks.get(),
            received: self.received.get(),
            invalid: self.invalid.get(),
            no_dev: self.no_dev.get(),
            opaque: self.opaque.get(),
        }
    }
}

impl CounterSnapshot {
    /// Named values in a stable order, for tabular output.
    pub fn entries(&self) -> [(&'static str, u64); 12] {
        [
            ("connections", self.connections),
            ("queued", self.queued),
            ("sent", self.sent),
            ("retries", self.retries),
            ("dropped", self.dropped),
            ("no-mem", self.no_mem),
            ("tx-ticks", self.tx_ticks),
            ("rx-ticks", self.rx_ticks),
            ("received", self.received),
            ("invalid", self.invalid),
            ("no-dev", self.no_dev),
            ("opaque", self.opaque),
        ]
    }
}
