use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{info, warn};
use xethsb_channel::{
    Channel, ChannelConfig, DeviceInfo, DeviceKind, DeviceRegistry, Encapsulation, EventSender,
    InterfaceAddress, LinkSettings, Registry, UpperLink,
};
use xethsb_frame::{ifa_event, reason};

use crate::cmd::{parse_duration, parse_interval, ServeArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS};
use crate::output::{print_counters, OutputFormat};

/// Device description file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevicesFile {
    #[serde(default)]
    pub ethtool_stats: Vec<String>,
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub uppers: Vec<UpperLink>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceSpec {
    #[serde(flatten)]
    pub info: DeviceInfo,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub ethtool_flags: u32,
    #[serde(default)]
    pub settings: LinkSettings,
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
}

pub fn parse_devices(text: &str) -> CliResult<Registry> {
    let file: DevicesFile = serde_json::from_str(text)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid devices file: {err}")))?;

    let registry = Registry::new(file.ethtool_stats);
    for entry in file.devices {
        if registry.lookup(entry.info.ifindex).is_some() {
            return Err(CliError::new(
                DATA_INVALID,
                format!("duplicate ifindex {}", entry.info.ifindex),
            ));
        }
        let dev = registry.insert(entry.info);
        dev.set_flags(entry.flags);
        dev.set_ethtool_flags(entry.ethtool_flags);
        dev.set_settings(entry.settings);
        for address in entry.addresses {
            dev.add_address(address);
        }
    }
    for link in file.uppers {
        registry.link_upper(link.upper, link.lower);
    }
    Ok(registry)
}

fn load_devices(path: &Path) -> CliResult<Registry> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    parse_devices(&text)
}

/// Announces bridge devices from the registry during a dump.
struct BridgeDump {
    registry: Arc<Registry>,
}

impl Encapsulation for BridgeDump {
    fn on_opaque_frame(&self, frame: &[u8]) {
        info!(len = frame.len(), "opaque frame from controller");
    }

    fn dump_associated_devices(&self, events: &EventSender) {
        self.registry.for_each_device(&mut |dev| {
            if !matches!(dev.kind(), DeviceKind::Bridge { .. }) {
                return;
            }
            if let Err(err) = events.send_ifinfo(dev, reason::DUMP) {
                warn!(ifindex = dev.ifindex(), %err, "bridge ifinfo not queued");
            }
            for address in dev.addresses() {
                if let Err(err) = events.send_ifa(dev, ifa_event::UP, &address) {
                    warn!(ifindex = dev.ifindex(), %err, "bridge ifa not queued");
                }
            }
        });
    }
}

fn channel_config(args: &ServeArgs) -> CliResult<ChannelConfig> {
    Ok(ChannelConfig {
        name: args.name.clone(),
        backlog: args.backlog,
        min_backoff: parse_interval("min-backoff", &args.min_backoff)?,
        max_backoff: parse_interval("max-backoff", &args.max_backoff)?,
        rx_timeout: parse_interval("rx-timeout", &args.rx_timeout)?,
        accept_poll: parse_interval("accept-poll", &args.accept_poll)?,
        ..ChannelConfig::default()
    })
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = channel_config(&args)?;
    let exit_after = args.exit_after.as_deref().map(parse_duration).transpose()?;
    let registry = Arc::new(match &args.devices {
        Some(path) => load_devices(path)?,
        None => Registry::default(),
    });
    info!(devices = registry.len(), "registry loaded");

    let channel = Channel::builder(Arc::clone(&registry) as Arc<dyn DeviceRegistry>)
        .with_config(config)
        .with_encapsulation(Arc::new(BridgeDump {
            registry: Arc::clone(&registry),
        }))
        .start()
        .map_err(|err| channel_error("start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let deadline = exit_after.map(|d| Instant::now() + d);
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    let counters = channel.counters();
    channel.stop();
    print_counters(&counters, format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const SAMPLE: &str = r#"{
        "ethtool_stats": ["rx-ok", "tx-ok"],
        "devices": [
            {"ifindex": 3, "name": "xeth1", "flags": 4099,
             "kind": {"type": "port", "portid": 0, "port": 0},
             "addresses": [{"address": "10.0.0.1", "prefix_len": 24}]},
            {"ifindex": 9, "name": "br0", "kind": {"type": "bridge", "id": 1}}
        ],
        "uppers": [{"upper": 9, "lower": 3}]
    }"#;

    #[test]
    fn parses_devices_file() {
        let registry = parse_devices(SAMPLE).expect("sample should parse");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ethtool_stat_count(), 2);
        assert_eq!(registry.uppers(), vec![UpperLink { upper: 9, lower: 3 }]);

        let port = registry.lookup(3).expect("port should exist");
        assert_eq!(port.flags(), 4099);
        assert_eq!(
            port.addresses()[0].address,
            Ipv4Addr::new(10, 0, 0, 1)
        );
        let DeviceKind::Port { subport, .. } = port.kind() else {
            panic!("expected port");
        };
        assert_eq!(*subport, -1);
    }

    #[test]
    fn rejects_duplicate_ifindex() {
        let text = r#"{"devices": [
            {"ifindex": 3, "name": "a", "kind": {"type": "other"}},
            {"ifindex": 3, "name": "b", "kind": {"type": "other"}}
        ]}"#;
        let err = parse_devices(text).expect_err("duplicate should fail");
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_devices("{\"devices\": [").expect_err("truncated json should fail");
        assert_eq!(err.code, DATA_INVALID);
    }
}
