//! Typed message payloads.
//!
//! Each payload knows its fixed wire size and how to write itself after
//! the header. Integers are big-endian; addresses are raw octets.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};

use crate::kind::Kind;

/// Interface name field width, including the terminating NUL.
pub const IFNAMSIZ: usize = 16;
/// Ethernet address length.
pub const ETH_ALEN: usize = 6;
/// Words per ethtool link-mode bitmap.
pub const LINK_MODE_WORDS: usize = 2;
/// Neighbor destination field width (fits an IPv6 address).
pub const NEIGH_DST_LEN: usize = 16;

/// Link-mode bitmap as carried in ethtool settings.
pub type LinkModes = [u64; LINK_MODE_WORDS];

/// Device type codes carried in interface records.
pub mod devtype {
    pub const PORT: u8 = 0;
    pub const LINUX_UNKNOWN: u8 = 128;
    pub const LINUX_BRIDGE: u8 = 129;
    pub const LINUX_VLAN: u8 = 130;
    pub const LINUX_VLAN_BRIDGE_PORT: u8 = 131;
}

/// Why an interface record was sent.
pub mod reason {
    pub const NEW: u8 = 0;
    pub const DELETE: u8 = 1;
    pub const UP: u8 = 2;
    pub const DOWN: u8 = 3;
    pub const DUMP: u8 = 4;
    pub const REGISTER: u8 = 5;
    pub const UNREGISTER: u8 = 6;
}

/// Address events, numbered like the kernel's netdev notifier events.
pub mod ifa_event {
    pub const UP: u32 = 1;
    pub const DOWN: u32 = 2;
}

/// Link-stat names, in the index order used on the wire.
pub const LINK_STAT_NAMES: [&str; 24] = [
    "rx-packets",
    "tx-packets",
    "rx-bytes",
    "tx-bytes",
    "rx-errors",
    "tx-errors",
    "rx-dropped",
    "tx-dropped",
    "multicast",
    "collisions",
    "rx-length-errors",
    "rx-over-errors",
    "rx-crc-errors",
    "rx-frame-errors",
    "rx-fifo-errors",
    "rx-missed-errors",
    "tx-aborted-errors",
    "tx-carrier-errors",
    "tx-fifo-errors",
    "tx-heartbeat-errors",
    "tx-window-errors",
    "rx-compressed",
    "tx-compressed",
    "rx-nohandler",
];

/// Number of link statistics per device.
pub const N_LINK_STATS: usize = LINK_STAT_NAMES.len();

fn get_array<const N: usize>(src: &mut &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    src.copy_to_slice(&mut out);
    out
}

fn get_ipv4(src: &mut &[u8]) -> Ipv4Addr {
    Ipv4Addr::from(get_array::<4>(src))
}

/// A link or ethtool statistic value (`LINK_STAT`, `ETHTOOL_STAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub ifindex: i32,
    pub index: u32,
    pub count: u64,
}

impl Stat {
    pub const SIZE: usize = 16;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u32(self.index);
        dst.put_u64(self.count);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        Self {
            ifindex: src.get_i32(),
            index: src.get_u32(),
            count: src.get_u64(),
        }
    }
}

/// Carrier state of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carrier {
    pub ifindex: i32,
    pub on: bool,
}

impl Carrier {
    pub const SIZE: usize = 8;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u8(u8::from(self.on));
        dst.put_bytes(0, 3);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let ifindex = src.get_i32();
        let on = src.get_u8() != 0;
        src.advance(3);
        Self { ifindex, on }
    }
}

/// Link speed in megabits per second; 0 is unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed {
    pub ifindex: i32,
    pub mbps: u32,
}

impl Speed {
    pub const SIZE: usize = 8;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u32(self.mbps);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        Self {
            ifindex: src.get_i32(),
            mbps: src.get_u32(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthtoolFlags {
    pub ifindex: i32,
    pub flags: u32,
}

impl EthtoolFlags {
    pub const SIZE: usize = 8;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u32(self.flags);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        Self {
            ifindex: src.get_i32(),
            flags: src.get_u32(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EthtoolSettings {
    pub ifindex: i32,
    pub speed: u32,
    pub duplex: u8,
    pub port: u8,
    pub phy_address: u8,
    pub autoneg: u8,
    pub mdio_support: u8,
    pub eth_tp_mdix: u8,
    pub eth_tp_mdix_ctrl: u8,
    pub link_mode_masks_nwords: u8,
    pub supported: LinkModes,
    pub advertising: LinkModes,
    pub lp_advertising: LinkModes,
}

impl EthtoolSettings {
    pub const SIZE: usize = 16 + 3 * LINK_MODE_WORDS * 8;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u32(self.speed);
        dst.put_u8(self.duplex);
        dst.put_u8(self.port);
        dst.put_u8(self.phy_address);
        dst.put_u8(self.autoneg);
        dst.put_u8(self.mdio_support);
        dst.put_u8(self.eth_tp_mdix);
        dst.put_u8(self.eth_tp_mdix_ctrl);
        dst.put_u8(self.link_mode_masks_nwords);
        for modes in [&self.supported, &self.advertising, &self.lp_advertising] {
            for word in modes {
                dst.put_u64(*word);
            }
        }
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let mut settings = Self {
            ifindex: src.get_i32(),
            speed: src.get_u32(),
            duplex: src.get_u8(),
            port: src.get_u8(),
            phy_address: src.get_u8(),
            autoneg: src.get_u8(),
            mdio_support: src.get_u8(),
            eth_tp_mdix: src.get_u8(),
            eth_tp_mdix_ctrl: src.get_u8(),
            link_mode_masks_nwords: src.get_u8(),
            ..Self::default()
        };
        for modes in [
            &mut settings.supported,
            &mut settings.advertising,
            &mut settings.lp_advertising,
        ] {
            for word in modes.iter_mut() {
                *word = src.get_u64();
            }
        }
        settings
    }
}

/// Interface information record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifinfo {
    /// At most `IFNAMSIZ - 1` bytes are carried; longer names are cut at
    /// a char boundary.
    pub ifname: String,
    pub net: u64,
    pub ifindex: i32,
    pub iflinkindex: i32,
    pub flags: u32,
    pub id: u32,
    pub portid: i32,
    pub portindex: i16,
    pub subportindex: i8,
    pub devtype: u8,
    pub reason: u8,
    pub addr: [u8; ETH_ALEN],
}

impl Ifinfo {
    pub const SIZE: usize = IFNAMSIZ + 8 + 4 * 5 + 2 + 1 + 1 + 1 + ETH_ALEN + 1;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        let mut name = [0u8; IFNAMSIZ];
        let mut n = self.ifname.len().min(IFNAMSIZ - 1);
        while !self.ifname.is_char_boundary(n) {
            n -= 1;
        }
        name[..n].copy_from_slice(&self.ifname.as_bytes()[..n]);
        dst.put_slice(&name);
        dst.put_u64(self.net);
        dst.put_i32(self.ifindex);
        dst.put_i32(self.iflinkindex);
        dst.put_u32(self.flags);
        dst.put_u32(self.id);
        dst.put_i32(self.portid);
        dst.put_i16(self.portindex);
        dst.put_i8(self.subportindex);
        dst.put_u8(self.devtype);
        dst.put_u8(self.reason);
        dst.put_slice(&self.addr);
        dst.put_u8(0);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let name = get_array::<IFNAMSIZ>(src);
        let end = name.iter().position(|b| *b == 0).unwrap_or(IFNAMSIZ);
        let ifname = String::from_utf8_lossy(&name[..end]).into_owned();
        let info = Self {
            ifname,
            net: src.get_u64(),
            ifindex: src.get_i32(),
            iflinkindex: src.get_i32(),
            flags: src.get_u32(),
            id: src.get_u32(),
            portid: src.get_i32(),
            portindex: src.get_i16(),
            subportindex: src.get_i8(),
            devtype: src.get_u8(),
            reason: src.get_u8(),
            addr: get_array::<ETH_ALEN>(src),
        };
        src.advance(1);
        info
    }
}

/// IPv4 interface address change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ifa {
    pub ifindex: i32,
    pub event: u32,
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl Ifa {
    pub const SIZE: usize = 16;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u32(self.event);
        dst.put_slice(&self.address.octets());
        dst.put_slice(&self.mask.octets());
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        Self {
            ifindex: src.get_i32(),
            event: src.get_u32(),
            address: get_ipv4(src),
            mask: get_ipv4(src),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub ifindex: i32,
    pub weight: i32,
    pub flags: u32,
    pub gw: Ipv4Addr,
    pub scope: u8,
}

impl NextHop {
    pub const SIZE: usize = 20;

    fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_i32(self.weight);
        dst.put_u32(self.flags);
        dst.put_slice(&self.gw.octets());
        dst.put_u8(self.scope);
        dst.put_bytes(0, 3);
    }

    fn get(src: &mut &[u8]) -> Self {
        let hop = Self {
            ifindex: src.get_i32(),
            weight: src.get_i32(),
            flags: src.get_u32(),
            gw: get_ipv4(src),
            scope: src.get_u8(),
        };
        src.advance(3);
        hop
    }
}

/// IPv4 FIB entry with its next-hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibEntry {
    pub net: u64,
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub event: u8,
    pub tos: u8,
    pub route_type: u8,
    pub table: u32,
    pub next_hops: Vec<NextHop>,
}

impl FibEntry {
    /// Size of the fixed part, before the next-hop tail.
    pub const SIZE: usize = 24;

    /// Wire size of this entry including its next-hops.
    pub fn wire_size(&self) -> usize {
        Self::SIZE + self.next_hops.len() * NextHop::SIZE
    }

    /// Mask for a prefix length, e.g. 24 -> 255.255.255.0.
    pub fn prefix_mask(len: u8) -> Ipv4Addr {
        match len {
            0 => Ipv4Addr::UNSPECIFIED,
            len => Ipv4Addr::from(u32::MAX << (32 - u32::from(len.min(32)))),
        }
    }

    /// Caller guarantees `next_hops.len() <= 255`.
    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_u64(self.net);
        dst.put_slice(&self.address.octets());
        dst.put_slice(&self.mask.octets());
        dst.put_u8(self.event);
        dst.put_u8(self.next_hops.len() as u8);
        dst.put_u8(self.tos);
        dst.put_u8(self.route_type);
        dst.put_u32(self.table);
        for hop in &self.next_hops {
            hop.put(dst);
        }
    }

    /// Parse the fixed part; returns the entry and its declared hop count.
    pub(crate) fn get_head(src: &mut &[u8]) -> (Self, usize) {
        let net = src.get_u64();
        let address = get_ipv4(src);
        let mask = get_ipv4(src);
        let event = src.get_u8();
        let nhs = usize::from(src.get_u8());
        let tos = src.get_u8();
        let route_type = src.get_u8();
        let table = src.get_u32();
        let entry = Self {
            net,
            address,
            mask,
            event,
            tos,
            route_type,
            table,
            next_hops: Vec::new(),
        };
        (entry, nhs)
    }

    /// Caller has checked that `nhs` hops remain in `src`.
    pub(crate) fn get_hops(&mut self, src: &mut &[u8], nhs: usize) {
        self.next_hops = (0..nhs).map(|_| NextHop::get(src)).collect();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ifdel {
    pub ifindex: i32,
    pub devtype: u8,
}

impl Ifdel {
    pub const SIZE: usize = 8;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u8(self.devtype);
        dst.put_bytes(0, 3);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let ifindex = src.get_i32();
        let devtype = src.get_u8();
        src.advance(3);
        Self { ifindex, devtype }
    }
}

/// Neighbor (ARP/ND) entry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighUpdate {
    pub net: u64,
    pub ifindex: i32,
    pub family: u8,
    /// Significant bytes of `dst`.
    pub len: u8,
    pub dst: [u8; NEIGH_DST_LEN],
    /// All zero unless the entry is valid.
    pub lladdr: [u8; ETH_ALEN],
}

impl NeighUpdate {
    pub const SIZE: usize = 8 + 4 + 4 + NEIGH_DST_LEN + ETH_ALEN + 2;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_u64(self.net);
        dst.put_i32(self.ifindex);
        dst.put_u8(self.family);
        dst.put_u8(self.len);
        dst.put_bytes(0, 2);
        dst.put_slice(&self.dst);
        dst.put_slice(&self.lladdr);
        dst.put_bytes(0, 2);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let net = src.get_u64();
        let ifindex = src.get_i32();
        let family = src.get_u8();
        let len = src.get_u8();
        src.advance(2);
        let dst = get_array::<NEIGH_DST_LEN>(src);
        let lladdr = get_array::<ETH_ALEN>(src);
        src.advance(2);
        Self {
            net,
            ifindex,
            family,
            len,
            dst,
            lladdr,
        }
    }
}

/// VLAN id added to or removed from a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ifvid {
    pub ifindex: i32,
    pub vid: u16,
    pub added: bool,
}

impl Ifvid {
    pub const SIZE: usize = 8;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.ifindex);
        dst.put_u16(self.vid);
        dst.put_u8(u8::from(self.added));
        dst.put_u8(0);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let ifindex = src.get_i32();
        let vid = src.get_u16();
        let added = src.get_u8() != 0;
        src.advance(1);
        Self {
            ifindex,
            vid,
            added,
        }
    }
}

/// Upper/lower device association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeUpper {
    pub upper: i32,
    pub lower: i32,
    pub linking: bool,
}

impl ChangeUpper {
    pub const SIZE: usize = 12;

    pub(crate) fn put(&self, dst: &mut impl BufMut) {
        dst.put_i32(self.upper);
        dst.put_i32(self.lower);
        dst.put_u8(u8::from(self.linking));
        dst.put_bytes(0, 3);
    }

    pub(crate) fn get(src: &mut &[u8]) -> Self {
        let upper = src.get_i32();
        let lower = src.get_i32();
        let linking = src.get_u8() != 0;
        src.advance(3);
        Self {
            upper,
            lower,
            linking,
        }
    }
}

/// A decoded side-band message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Break,
    LinkStat(Stat),
    EthtoolStat(Stat),
    EthtoolFlags(EthtoolFlags),
    EthtoolSettings(EthtoolSettings),
    DumpIfinfo,
    Carrier(Carrier),
    Speed(Speed),
    Ifinfo(Ifinfo),
    Ifa(Ifa),
    DumpFibinfo,
    FibEntry(FibEntry),
    Ifdel(Ifdel),
    NeighUpdate(NeighUpdate),
    Ifvid(Ifvid),
    ChangeUpper(ChangeUpper),
}

impl Message {
    pub fn kind(&self) -> Kind {
        match self {
            Message::Break => Kind::Break,
            Message::LinkStat(_) => Kind::LinkStat,
            Message::EthtoolStat(_) => Kind::EthtoolStat,
            Message::EthtoolFlags(_) => Kind::EthtoolFlags,
            Message::EthtoolSettings(_) => Kind::EthtoolSettings,
            Message::DumpIfinfo => Kind::DumpIfinfo,
            Message::Carrier(_) => Kind::Carrier,
            Message::Speed(_) => Kind::Speed,
            Message::Ifinfo(_) => Kind::Ifinfo,
            Message::Ifa(_) => Kind::Ifa,
            Message::DumpFibinfo => Kind::DumpFibinfo,
            Message::FibEntry(_) => Kind::FibEntry,
            Message::Ifdel(_) => Kind::Ifdel,
            Message::NeighUpdate(_) => Kind::NeighUpdate,
            Message::Ifvid(_) => Kind::Ifvid,
            Message::ChangeUpper(_) => Kind::ChangeUpper,
        }
    }

    /// Payload size, excluding the header.
    pub fn payload_size(&self) -> usize {
        match self {
            Message::FibEntry(entry) => entry.wire_size(),
            _ => fixed_payload_size(self.kind()),
        }
    }

    /// Ifindex the message refers to, if any.
    pub fn ifindex(&self) -> Option<i32> {
        match self {
            Message::LinkStat(m) | Message::EthtoolStat(m) => Some(m.ifindex),
            Message::EthtoolFlags(m) => Some(m.ifindex),
            Message::EthtoolSettings(m) => Some(m.ifindex),
            Message::Carrier(m) => Some(m.ifindex),
            Message::Speed(m) => Some(m.ifindex),
            Message::Ifinfo(m) => Some(m.ifindex),
            Message::Ifa(m) => Some(m.ifindex),
            Message::Ifdel(m) => Some(m.ifindex),
            Message::NeighUpdate(m) => Some(m.ifindex),
            Message::Ifvid(m) => Some(m.ifindex),
            Message::ChangeUpper(m) => Some(m.upper),
            Message::Break | Message::DumpIfinfo | Message::DumpFibinfo | Message::FibEntry(_) => {
                None
            }
        }
    }

    pub(crate) fn put_payload(&self, dst: &mut impl BufMut) {
        match self {
            Message::Break | Message::DumpIfinfo | Message::DumpFibinfo => {}
            Message::LinkStat(m) | Message::EthtoolStat(m) => m.put(dst),
            Message::EthtoolFlags(m) => m.put(dst),
            Message::EthtoolSettings(m) => m.put(dst),
            Message::Carrier(m) => m.put(dst),
            Message::Speed(m) => m.put(dst),
            Message::Ifinfo(m) => m.put(dst),
            Message::Ifa(m) => m.put(dst),
            Message::FibEntry(m) => m.put(dst),
            Message::Ifdel(m) => m.put(dst),
            Message::NeighUpdate(m) => m.put(dst),
            Message::Ifvid(m) => m.put(dst),
            Message::ChangeUpper(m) => m.put(dst),
        }
    }
}

/// Fixed payload size per kind; for `FibEntry` the size without next-hops.
pub fn fixed_payload_size(kind: Kind) -> usize {
    match kind {
        Kind::Break | Kind::DumpIfinfo | Kind::DumpFibinfo => 0,
        Kind::LinkStat | Kind::EthtoolStat => Stat::SIZE,
        Kind::EthtoolFlags => EthtoolFlags::SIZE,
        Kind::EthtoolSettings => EthtoolSettings::SIZE,
        Kind::Carrier => Carrier::SIZE,
        Kind::Speed => Speed::SIZE,
        Kind::Ifinfo => Ifinfo::SIZE,
        Kind::Ifa => Ifa::SIZE,
        Kind::FibEntry => FibEntry::SIZE,
        Kind::Ifdel => Ifdel::SIZE,
        Kind::NeighUpdate => NeighUpdate::SIZE,
        Kind::Ifvid => Ifvid::SIZE,
        Kind::ChangeUpper => ChangeUpper::SIZE,
    }
}
