//! Fixed-layout binary message codec for the xeth side-band channel.
//!
//! Every frame starts with a 16-byte header:
//! - 12 zero bytes, the signature that tells native messages apart from
//!   opaque traffic sharing the socket
//! - a 4-byte big-endian kind
//!
//! The payload layout is fixed per kind. `FIBENTRY` alone carries a
//! variable tail: a count followed by that many fixed-size next-hops.

pub mod codec;
pub mod error;
pub mod kind;
pub mod message;

pub use codec::{decode, encode, is_message, raw_kind, HEADER_SIZE, JUMBO_FRAME_SIZE};
pub use error::{FrameError, Result};
pub use kind::Kind;
pub use message::{
    devtype, ifa_event, reason, Carrier, ChangeUpper, EthtoolFlags, EthtoolSettings, FibEntry,
    Ifa, Ifdel, Ifinfo, Ifvid, LinkModes, Message, NeighUpdate, NextHop, Speed, Stat,
    ETH_ALEN, IFNAMSIZ, LINK_MODE_WORDS, LINK_STAT_NAMES, NEIGH_DST_LEN, N_LINK_STATS,
};
