use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::collab::{Encapsulation, FibNotifier};
use crate::config::ChannelConfig;
use crate::counters::Counters;
use crate::device::DeviceRegistry;
use crate::events::EventSender;
use crate::queue::OutboundQueue;

/// Lifecycle of the single controller slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Listener not running.
    Idle = 0,
    /// Waiting for a controller.
    Accepting = 1,
    /// Controller connected, workers running.
    Active = 2,
    /// Workers finished, tearing down.
    Draining = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Accepting,
            2 => ConnectionState::Active,
            3 => ConnectionState::Draining,
            _ => ConnectionState::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Accepting => "accepting",
            ConnectionState::Active => "active",
            ConnectionState::Draining => "draining",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the listener, workers, and producers share.
pub(crate) struct ChannelContext {
    pub(crate) config: ChannelConfig,
    pub(crate) counters: Arc<Counters>,
    pub(crate) queue: Arc<OutboundQueue>,
    pub(crate) registry: Arc<dyn DeviceRegistry>,
    pub(crate) encap: Arc<dyn Encapsulation>,
    pub(crate) fib: Arc<dyn FibNotifier>,
    state: AtomicU8,
}

impl ChannelContext {
    pub(crate) fn new(
        config: ChannelConfig,
        registry: Arc<dyn DeviceRegistry>,
        encap: Arc<dyn Encapsulation>,
        fib: Arc<dyn FibNotifier>,
    ) -> Self {
        let counters = Arc::new(Counters::default());
        Self {
            config,
            queue: Arc::new(OutboundQueue::new(Arc::clone(&counters))),
            counters,
            registry,
            encap,
            fib,
            state: AtomicU8::new(ConnectionState::Idle as u8),
        }
    }

    pub(crate) fn events(&self) -> EventSender {
        EventSender::new(Arc::clone(&self.queue), Arc::clone(&self.counters))
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}
