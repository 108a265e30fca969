//! Side-band channel between the xeth mux and a user-space controller.
//!
//! A [`Channel`] listens on a `SOCK_SEQPACKET` rendezvous socket and serves
//! one controller at a time. On connect it re-announces every device,
//! ending with a `BREAK`. While connected, device events queued through an
//! [`EventSender`] flow to the controller, and the controller's carrier,
//! stat, and speed updates flow back into the [`DeviceRegistry`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use xethsb_channel::{Channel, ChannelConfig, Registry};
//!
//! let registry = Arc::new(Registry::default());
//! let channel = Channel::start(ChannelConfig::default(), registry)?;
//! println!("listening on {}", channel.name());
//! # Ok::<(), xethsb_channel::ChannelError>(())
//! ```

mod announce;
pub mod cancel;
pub mod collab;
pub mod config;
mod context;
pub mod counters;
pub mod device;
pub mod error;
pub mod events;
pub mod listener;
pub mod queue;
mod rx;
pub mod session;
mod tx;

pub use cancel::CancelToken;
pub use collab::{Encapsulation, FibNotifier, NoEncapsulation, NoFibNotifier};
pub use config::{ChannelConfig, MAX_POLL_INTERVAL};
pub use context::ConnectionState;
pub use counters::{Counter, CounterSnapshot, Counters};
pub use device::{
    Device, DeviceInfo, DeviceKind, DeviceRegistry, DeviceState, InterfaceAddress, LinkSettings,
    Registry, UpperLink, DEFAULT_NET,
};
pub use error::{ChannelError, Result};
pub use events::{EventSender, Neighbor};
pub use listener::{Channel, ChannelBuilder};
pub use queue::OutboundQueue;
pub use session::Link;
