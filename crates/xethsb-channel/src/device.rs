//! Devices the channel reports on, and the registry it reads them from.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use xethsb_frame::{devtype, FibEntry, LinkModes, ETH_ALEN, N_LINK_STATS};

/// Network namespace number of the default namespace.
pub const DEFAULT_NET: u64 = 1;

fn default_net() -> u64 {
    DEFAULT_NET
}

/// What role a device plays in the mux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeviceKind {
    /// Front-panel port or subport.
    Port {
        #[serde(default)]
        id: u32,
        portid: i32,
        #[serde(default = "no_index")]
        port: i16,
        #[serde(default = "no_subport")]
        subport: i8,
        #[serde(default)]
        devtype: u8,
    },
    /// VLAN sub-interface of a port.
    Vlan {
        vid: u16,
        #[serde(default)]
        bridge_port: bool,
    },
    /// Bridge the encapsulation layer is responsible for.
    Bridge { id: u32 },
    /// Anything else. Never reported.
    Other,
}

fn no_index() -> i16 {
    -1
}

fn no_subport() -> i8 {
    -1
}

impl DeviceKind {
    pub fn devtype(&self) -> u8 {
        match self {
            DeviceKind::Port { devtype, .. } => *devtype,
            DeviceKind::Vlan {
                bridge_port: true, ..
            } => devtype::LINUX_VLAN_BRIDGE_PORT,
            DeviceKind::Vlan { .. } => devtype::LINUX_VLAN,
            DeviceKind::Bridge { .. } => devtype::LINUX_BRIDGE,
            DeviceKind::Other => devtype::LINUX_UNKNOWN,
        }
    }

    /// Returns true for kinds the channel sends notifications about.
    pub fn is_reported(&self) -> bool {
        !matches!(self, DeviceKind::Other)
    }
}

/// Immutable identity of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub ifindex: i32,
    pub name: String,
    /// Lower device ifindex. Defaults to the device's own.
    #[serde(default)]
    pub iflink: Option<i32>,
    #[serde(default = "default_net")]
    pub net: u64,
    #[serde(default)]
    pub addr: [u8; ETH_ALEN],
    pub kind: DeviceKind,
}

impl DeviceInfo {
    pub fn iflink(&self) -> i32 {
        self.iflink.unwrap_or(self.ifindex)
    }

    /// Value of the `id` field in interface announcements.
    pub fn id(&self) -> u32 {
        match self.kind {
            DeviceKind::Port { id, .. } => id,
            DeviceKind::Vlan { vid, .. } => u32::from(vid),
            DeviceKind::Bridge { id } => id,
            DeviceKind::Other => 0,
        }
    }
}

/// An IPv4 address assigned to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl InterfaceAddress {
    pub fn mask(&self) -> Ipv4Addr {
        FibEntry::prefix_mask(self.prefix_len)
    }
}

/// Link settings as reported by ethtool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub speed: u32,
    pub duplex: u8,
    pub port: u8,
    pub phy_address: u8,
    pub autoneg: bool,
    pub mdio_support: u8,
    pub eth_tp_mdix: u8,
    pub eth_tp_mdix_ctrl: u8,
    pub supported: LinkModes,
    pub advertising: LinkModes,
    pub lp_advertising: LinkModes,
}

/// Mutable per-device state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub carrier: bool,
    /// Interface flags (`IFF_*`).
    pub flags: u32,
    pub ethtool_flags: u32,
    pub settings: LinkSettings,
    pub addresses: Vec<InterfaceAddress>,
    pub link_stats: [u64; N_LINK_STATS],
    pub ethtool_stats: Vec<u64>,
    /// Number of link stat writes from the controller.
    pub link_stat_updates: u64,
    /// Number of ethtool stat writes from the controller.
    pub ethtool_stat_updates: u64,
}

impl DeviceState {
    fn new(ethtool_stats: usize) -> Self {
        Self {
            carrier: false,
            flags: 0,
            ethtool_flags: 0,
            settings: LinkSettings::default(),
            addresses: Vec::new(),
            link_stats: [0; N_LINK_STATS],
            ethtool_stats: vec![0; ethtool_stats],
            link_stat_updates: 0,
            ethtool_stat_updates: 0,
        }
    }
}

/// A device record: fixed identity plus state behind a per-device lock.
#[derive(Debug)]
pub struct Device {
    info: DeviceInfo,
    state: Mutex<DeviceState>,
}

impl Device {
    pub fn new(info: DeviceInfo, ethtool_stats: usize) -> Self {
        Self {
            info,
            state: Mutex::new(DeviceState::new(ethtool_stats)),
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn ifindex(&self) -> i32 {
        self.info.ifindex
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> &DeviceKind {
        &self.info.kind
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn state(&self) -> DeviceState {
        self.lock().clone()
    }

    pub fn carrier(&self) -> bool {
        self.lock().carrier
    }

    pub fn set_carrier(&self, on: bool) {
        self.lock().carrier = on;
    }

    pub fn flags(&self) -> u32 {
        self.lock().flags
    }

    pub fn set_flags(&self, flags: u32) {
        self.lock().flags = flags;
    }

    pub fn ethtool_flags(&self) -> u32 {
        self.lock().ethtool_flags
    }

    pub fn set_ethtool_flags(&self, flags: u32) {
        self.lock().ethtool_flags = flags;
    }

    pub fn settings(&self) -> LinkSettings {
        self.lock().settings
    }

    pub fn set_settings(&self, settings: LinkSettings) {
        self.lock().settings = settings;
    }

    pub fn speed(&self) -> u32 {
        self.lock().settings.speed
    }

    pub fn set_speed(&self, mbps: u32) {
        self.lock().settings.speed = mbps;
    }

    pub fn addresses(&self) -> Vec<InterfaceAddress> {
        self.lock().addresses.clone()
    }

    pub fn add_address(&self, address: InterfaceAddress) {
        let mut state = self.lock();
        if !state.addresses.contains(&address) {
            state.addresses.push(address);
        }
    }

    /// Returns true if the address was present.
    pub fn remove_address(&self, address: &InterfaceAddress) -> bool {
        let mut state = self.lock();
        let before = state.addresses.len();
        state.addresses.retain(|a| a != address);
        state.addresses.len() != before
    }

    pub fn link_stat(&self, index: usize) -> Option<u64> {
        self.lock().link_stats.get(index).copied()
    }

    /// Returns false if `index` is out of range.
    pub fn set_link_stat(&self, index: usize, value: u64) -> bool {
        let mut state = self.lock();
        let Some(slot) = state.link_stats.get_mut(index) else {
            return false;
        };
        *slot = value;
        state.link_stat_updates += 1;
        true
    }

    pub fn ethtool_stat(&self, index: usize) -> Option<u64> {
        self.lock().ethtool_stats.get(index).copied()
    }

    /// Returns false if `index` is out of range.
    pub fn set_ethtool_stat(&self, index: usize, value: u64) -> bool {
        let mut state = self.lock();
        let Some(slot) = state.ethtool_stats.get_mut(index) else {
            return false;
        };
        *slot = value;
        state.ethtool_stat_updates += 1;
        true
    }

    /// Zero all statistics ahead of a fresh controller session.
    pub fn reset_stats(&self) {
        let mut state = self.lock();
        state.link_stats = [0; N_LINK_STATS];
        state.ethtool_stats.iter_mut().for_each(|v| *v = 0);
        state.link_stat_updates = 0;
        state.ethtool_stat_updates = 0;
    }
}

/// Upper/lower adjacency between two devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpperLink {
    pub upper: i32,
    pub lower: i32,
}

/// Source of device records for the channel.
///
/// Implementations must be safe to read while the RX worker writes
/// device state.
pub trait DeviceRegistry: Send + Sync {
    fn lookup(&self, ifindex: i32) -> Option<Arc<Device>>;

    /// Visit every device. The callback may enqueue events.
    fn for_each_device(&self, f: &mut dyn FnMut(&Arc<Device>));

    /// Current upper/lower links among reported devices.
    fn uppers(&self) -> Vec<UpperLink> {
        Vec::new()
    }

    /// Length of every port's ethtool stat array.
    fn ethtool_stat_count(&self) -> usize;
}

/// In-memory [`DeviceRegistry`] keyed by ifindex.
#[derive(Debug, Default)]
pub struct Registry {
    devices: RwLock<BTreeMap<i32, Arc<Device>>>,
    uppers: RwLock<Vec<UpperLink>>,
    ethtool_stat_names: Vec<String>,
}

impl Registry {
    pub fn new(ethtool_stat_names: Vec<String>) -> Self {
        Self {
            ethtool_stat_names,
            ..Self::default()
        }
    }

    pub fn ethtool_stat_names(&self) -> &[String] {
        &self.ethtool_stat_names
    }

    /// Add or replace a device.
    pub fn insert(&self, info: DeviceInfo) -> Arc<Device> {
        let device = Arc::new(Device::new(info, self.ethtool_stat_names.len()));
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device.ifindex(), Arc::clone(&device));
        device
    }

    pub fn remove(&self, ifindex: i32) -> Option<Arc<Device>> {
        self.uppers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|u| u.upper != ifindex && u.lower != ifindex);
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ifindex)
    }

    pub fn link_upper(&self, upper: i32, lower: i32) {
        let link = UpperLink { upper, lower };
        let mut uppers = self.uppers.write().unwrap_or_else(PoisonError::into_inner);
        if !uppers.contains(&link) {
            uppers.push(link);
        }
    }

    pub fn unlink_upper(&self, upper: i32, lower: i32) {
        self.uppers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|u| !(u.upper == upper && u.lower == lower));
    }

    pub fn len(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn devices(&self) -> Vec<Arc<Device>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl DeviceRegistry for Registry {
    fn lookup(&self, ifindex: i32) -> Option<Arc<Device>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ifindex)
            .cloned()
    }

    fn for_each_device(&self, f: &mut dyn FnMut(&Arc<Device>)) {
        // Visit a snapshot so callbacks never run under the map lock.
        for device in self.devices() {
            f(&device);
        }
    }

    fn uppers(&self) -> Vec<UpperLink> {
        self.uppers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ethtool_stat_count(&self) -> usize {
        self.ethtool_stat_names.len()
    }
}
