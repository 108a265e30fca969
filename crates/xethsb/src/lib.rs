//! Side-band control channel between the xeth mux and its user-space
//! controller.
//!
//! # Crate Structure
//!
//! - [`transport`]: `SOCK_SEQPACKET` rendezvous socket and streams
//! - [`frame`]: fixed-layout message codec
//! - [`channel`]: connection lifecycle, outbound queue, and inbound
//!   dispatch (behind the `channel` feature)

/// Re-export transport types.
pub mod transport {
    pub use xethsb_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xethsb_frame::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use xethsb_channel::*;
}
