//! Message kinds.
//!
//! The numbering is part of the wire format and must not be reordered.

use std::fmt;

/// Message kind carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Kind {
    /// End-of-dump marker.
    Break = 0,
    LinkStat = 1,
    EthtoolStat = 2,
    EthtoolFlags = 3,
    EthtoolSettings = 4,
    /// Controller request for a full re-announcement.
    DumpIfinfo = 5,
    Carrier = 6,
    Speed = 7,
    Ifinfo = 8,
    Ifa = 9,
    /// Controller request to subscribe to FIB updates.
    DumpFibinfo = 10,
    FibEntry = 11,
    Ifdel = 12,
    NeighUpdate = 13,
    Ifvid = 14,
    ChangeUpper = 15,
}

impl Kind {
    /// Every kind, in wire order.
    pub const ALL: [Kind; 16] = [
        Kind::Break,
        Kind::LinkStat,
        Kind::EthtoolStat,
        Kind::EthtoolFlags,
        Kind::EthtoolSettings,
        Kind::DumpIfinfo,
        Kind::Carrier,
        Kind::Speed,
        Kind::Ifinfo,
        Kind::Ifa,
        Kind::DumpFibinfo,
        Kind::FibEntry,
        Kind::Ifdel,
        Kind::NeighUpdate,
        Kind::Ifvid,
        Kind::ChangeUpper,
    ];

    /// Look up a kind by its wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Wire value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Break => "break",
            Kind::LinkStat => "link-stat",
            Kind::EthtoolStat => "ethtool-stat",
            Kind::EthtoolFlags => "ethtool-flags",
            Kind::EthtoolSettings => "ethtool-settings",
            Kind::DumpIfinfo => "dump-ifinfo",
            Kind::Carrier => "carrier",
            Kind::Speed => "speed",
            Kind::Ifinfo => "ifinfo",
            Kind::Ifa => "ifa",
            Kind::DumpFibinfo => "dump-fibinfo",
            Kind::FibEntry => "fib-entry",
            Kind::Ifdel => "ifdel",
            Kind::NeighUpdate => "neigh-update",
            Kind::Ifvid => "ifvid",
            Kind::ChangeUpper => "change-upper",
        }
    }

    /// Returns true for kinds the controller sends to the mux.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Kind::Carrier
                | Kind::LinkStat
                | Kind::EthtoolStat
                | Kind::DumpIfinfo
                | Kind::Speed
                | Kind::DumpFibinfo
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
