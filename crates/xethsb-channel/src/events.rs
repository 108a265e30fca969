//! Builders that turn device events into queued frames.

use std::net::IpAddr;
use std::sync::Arc;

use xethsb_frame::{
    encode, Carrier, ChangeUpper, EthtoolFlags, EthtoolSettings, FibEntry, FrameError, Ifa,
    Ifdel, Ifinfo, Ifvid, Message, NeighUpdate, Speed, Stat, ETH_ALEN, LINK_MODE_WORDS,
    NEIGH_DST_LEN,
};

use crate::counters::Counters;
use crate::device::{Device, DeviceKind, InterfaceAddress};
use crate::error::Result;
use crate::queue::OutboundQueue;

const AF_INET: u8 = 2;
const AF_INET6: u8 = 10;

/// Neighbor table entry to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub net: u64,
    pub ifindex: i32,
    pub dst: IpAddr,
    /// Link-layer address, present only for valid entries.
    pub lladdr: Option<[u8; ETH_ALEN]>,
}

/// Handle for enqueueing notifications towards the controller.
///
/// Cheap to clone. Every `send_*` is fire-and-forget: with no controller
/// connected the frame is counted as dropped and `Ok(())` is returned.
#[derive(Debug, Clone)]
pub struct EventSender {
    queue: Arc<OutboundQueue>,
    counters: Arc<Counters>,
}

impl EventSender {
    pub(crate) fn new(queue: Arc<OutboundQueue>, counters: Arc<Counters>) -> Self {
        Self { queue, counters }
    }

    /// Returns true while a controller is connected.
    pub fn is_connected(&self) -> bool {
        self.queue.is_open()
    }

    /// Encode and append any message.
    pub fn enqueue(&self, message: &Message) -> Result<()> {
        let frame = encode(message).inspect_err(|err| {
            if matches!(err, FrameError::Alloc(_)) {
                self.counters.no_mem.inc();
            }
        })?;
        self.queue.push_back(frame);
        Ok(())
    }

    /// Skip devices the controller has no use for, and skip encoding
    /// entirely while nobody listens.
    fn skip(&self, dev: &Device) -> bool {
        if !dev.kind().is_reported() {
            return true;
        }
        if !self.queue.is_open() {
            self.counters.dropped.inc();
            return true;
        }
        false
    }

    pub fn send_break(&self) -> Result<()> {
        self.enqueue(&Message::Break)
    }

    pub fn send_carrier(&self, dev: &Device, on: bool) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::Carrier(Carrier {
            ifindex: dev.ifindex(),
            on,
        }))
    }

    pub fn send_speed(&self, dev: &Device, mbps: u32) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::Speed(Speed {
            ifindex: dev.ifindex(),
            mbps,
        }))
    }

    pub fn send_link_stat(&self, dev: &Device, index: u32, count: u64) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::LinkStat(Stat {
            ifindex: dev.ifindex(),
            index,
            count,
        }))
    }

    pub fn send_ethtool_stat(&self, dev: &Device, index: u32, count: u64) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::EthtoolStat(Stat {
            ifindex: dev.ifindex(),
            index,
            count,
        }))
    }

    pub fn send_change_upper(&self, upper: i32, lower: i32, linking: bool) -> Result<()> {
        self.enqueue(&Message::ChangeUpper(ChangeUpper {
            upper,
            lower,
            linking,
        }))
    }

    pub fn send_ethtool_flags(&self, dev: &Device) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::EthtoolFlags(EthtoolFlags {
            ifindex: dev.ifindex(),
            flags: dev.ethtool_flags(),
        }))
    }

    /// Link settings. Speed reads as zero while autonegotiation is on.
    pub fn send_ethtool_settings(&self, dev: &Device) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        let s = dev.settings();
        self.enqueue(&Message::EthtoolSettings(EthtoolSettings {
            ifindex: dev.ifindex(),
            speed: if s.autoneg { 0 } else { s.speed },
            duplex: s.duplex,
            port: s.port,
            phy_address: s.phy_address,
            autoneg: u8::from(s.autoneg),
            mdio_support: s.mdio_support,
            eth_tp_mdix: s.eth_tp_mdix,
            eth_tp_mdix_ctrl: s.eth_tp_mdix_ctrl,
            link_mode_masks_nwords: LINK_MODE_WORDS as u8,
            supported: s.supported,
            advertising: s.advertising,
            lp_advertising: s.lp_advertising,
        }))
    }

    pub fn send_ifa(&self, dev: &Device, event: u32, address: &InterfaceAddress) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::Ifa(Ifa {
            ifindex: dev.ifindex(),
            event,
            address: address.address,
            mask: address.mask(),
        }))
    }

    /// Interface announcement with the device's current flags.
    pub fn send_ifinfo(&self, dev: &Device, reason: u8) -> Result<()> {
        self.send_ifinfo_with_flags(dev, dev.flags(), reason)
    }

    pub fn send_ifinfo_with_flags(&self, dev: &Device, flags: u32, reason: u8) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        let info = dev.info();
        let (portid, portindex, subportindex) = match info.kind {
            DeviceKind::Port {
                portid,
                port,
                subport,
                ..
            } => (portid, port, subport),
            _ => (-1, -1, -1),
        };
        self.enqueue(&Message::Ifinfo(Ifinfo {
            ifname: info.name.clone(),
            net: info.net,
            ifindex: info.ifindex,
            iflinkindex: info.iflink(),
            flags,
            id: info.id(),
            portid,
            portindex,
            subportindex,
            devtype: info.kind.devtype(),
            reason,
            addr: info.addr,
        }))
    }

    pub fn send_ifdel(&self, dev: &Device) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::Ifdel(Ifdel {
            ifindex: dev.ifindex(),
            devtype: dev.kind().devtype(),
        }))
    }

    pub fn send_ifvid(&self, dev: &Device, vid: u16, added: bool) -> Result<()> {
        if self.skip(dev) {
            return Ok(());
        }
        self.enqueue(&Message::Ifvid(Ifvid {
            ifindex: dev.ifindex(),
            vid,
            added,
        }))
    }

    pub fn send_fib_entry(&self, entry: FibEntry) -> Result<()> {
        self.enqueue(&Message::FibEntry(entry))
    }

    pub fn send_neigh_update(&self, neighbor: &Neighbor) -> Result<()> {
        let mut dst = [0u8; NEIGH_DST_LEN];
        let (family, len) = match neighbor.dst {
            IpAddr::V4(v4) => {
                dst[..4].copy_from_slice(&v4.octets());
                (AF_INET, 4)
            }
            IpAddr::V6(v6) => {
                dst.copy_from_slice(&v6.octets());
                (AF_INET6, 16)
            }
        };
        self.enqueue(&Message::NeighUpdate(NeighUpdate {
            net: neighbor.net,
            ifindex: neighbor.ifindex,
            family,
            len,
            dst,
            lladdr: neighbor.lladdr.unwrap_or_default(),
        }))
    }
}
