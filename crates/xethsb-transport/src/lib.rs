//! Local seqpacket transport for the xeth side-band channel.
//!
//! The channel runs over `AF_UNIX` / `SOCK_SEQPACKET`: connection-oriented,
//! reliable, and datagram-boundary preserving, so one `send` is one frame
//! and one `recv` returns at most one frame.
//!
//! This is the lowest layer of xethsb. Everything else builds on top of
//! the [`SeqpacketStream`] type provided here.

pub mod addr;
pub mod error;

#[cfg(target_os = "linux")]
pub mod stream;
#[cfg(target_os = "linux")]
pub mod uds;

pub use addr::SocketName;
pub use error::{Result, TransportError};

#[cfg(target_os = "linux")]
pub use stream::{PeerCredentials, SeqpacketStream};
#[cfg(target_os = "linux")]
pub use uds::SeqpacketListener;
