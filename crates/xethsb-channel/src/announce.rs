//! Full re-announcement of device state.

use std::sync::Arc;

use tracing::{debug, warn};
use xethsb_frame::{ifa_event, reason};

use crate::context::ChannelContext;
use crate::device::{Device, DeviceKind};
use crate::error::Result;
use crate::events::EventSender;

fn logged(what: &str, ifindex: i32, result: Result<()>) {
    if let Err(err) = result {
        warn!(what, ifindex, %err, "dump entry not queued");
    }
}

fn dump_addresses(events: &EventSender, dev: &Device) {
    for address in dev.addresses() {
        logged(
            "ifa",
            dev.ifindex(),
            events.send_ifa(dev, ifa_event::UP, &address),
        );
    }
}

fn dump_port(events: &EventSender, dev: &Device) {
    logged("ifinfo", dev.ifindex(), events.send_ifinfo(dev, reason::DUMP));
    dump_addresses(events, dev);
    logged(
        "ethtool-flags",
        dev.ifindex(),
        events.send_ethtool_flags(dev),
    );
    logged(
        "ethtool-settings",
        dev.ifindex(),
        events.send_ethtool_settings(dev),
    );
}

fn dump_vlan(events: &EventSender, dev: &Device) {
    logged("ifinfo", dev.ifindex(), events.send_ifinfo(dev, reason::DUMP));
    dump_addresses(events, dev);
}

fn visit(ctx: &ChannelContext, mut f: impl FnMut(&Arc<Device>)) {
    ctx.registry.for_each_device(&mut |dev| f(dev));
}

/// Queue every port, then every VLAN, then encapsulation devices, then
/// upper links, and finish with a break.
pub(crate) fn dump_all(ctx: &ChannelContext) {
    let events = ctx.events();

    visit(ctx, |dev| {
        if matches!(dev.kind(), DeviceKind::Port { .. }) {
            dump_port(&events, dev);
        }
    });
    visit(ctx, |dev| {
        if matches!(dev.kind(), DeviceKind::Vlan { .. }) {
            dump_vlan(&events, dev);
        }
    });

    ctx.encap.dump_associated_devices(&events);

    for link in ctx.registry.uppers() {
        logged(
            "change-upper",
            link.upper,
            events.send_change_upper(link.upper, link.lower, true),
        );
    }

    if let Err(err) = events.send_break() {
        warn!(%err, "break not queued");
    }
    debug!(queued = ctx.queue.len(), "dump queued");
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use xethsb_frame::{decode, Kind, Message};

    use super::*;
    use crate::collab::{NoEncapsulation, NoFibNotifier};
    use crate::config::ChannelConfig;
    use crate::device::{DeviceInfo, InterfaceAddress, Registry, DEFAULT_NET};

    fn info(ifindex: i32, kind: DeviceKind) -> DeviceInfo {
        DeviceInfo {
            ifindex,
            name: format!("dev{ifindex}"),
            iflink: None,
            net: DEFAULT_NET,
            addr: [0; 6],
            kind,
        }
    }

    fn drain(ctx: &ChannelContext) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(frame) = ctx.queue.pop_front() {
            out.push(decode(&frame).expect("dump frame should decode"));
        }
        out
    }

    #[test]
    fn dump_order_ports_vlans_uppers_break() {
        let registry = Arc::new(Registry::default());
        // Insert the VLAN first to show ordering is by kind, not ifindex.
        registry.insert(info(
            2,
            DeviceKind::Vlan {
                vid: 10,
                bridge_port: false,
            },
        ));
        let port = registry.insert(info(
            3,
            DeviceKind::Port {
                id: 1,
                portid: 0,
                port: 0,
                subport: -1,
                devtype: 0,
            },
        ));
        port.add_address(InterfaceAddress {
            address: Ipv4Addr::new(192, 168, 0, 1),
            prefix_len: 24,
        });
        registry.insert(info(4, DeviceKind::Other));
        registry.link_upper(9, 3);

        let ctx = ChannelContext::new(
            ChannelConfig::default(),
            registry,
            Arc::new(NoEncapsulation),
            Arc::new(NoFibNotifier),
        );
        ctx.queue.open();
        dump_all(&ctx);

        let kinds: Vec<Kind> = drain(&ctx).iter().map(Message::kind).collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Ifinfo,
                Kind::Ifa,
                Kind::EthtoolFlags,
                Kind::EthtoolSettings,
                Kind::Ifinfo,
                Kind::ChangeUpper,
                Kind::Break,
            ]
        );
    }

    #[test]
    fn empty_registry_dumps_only_break() {
        let ctx = ChannelContext::new(
            ChannelConfig::default(),
            Arc::new(Registry::default()),
            Arc::new(NoEncapsulation),
            Arc::new(NoFibNotifier),
        );
        ctx.queue.open();
        dump_all(&ctx);
        assert_eq!(drain(&ctx), vec![Message::Break]);
    }
}
