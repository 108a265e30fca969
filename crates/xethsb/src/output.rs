use std::io::IsTerminal;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xethsb_channel::CounterSnapshot;
use xethsb_frame::{ifa_event, Message, LINK_STAT_NAMES};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    ifindex: Option<i32>,
    detail: String,
    timestamp: String,
}

fn mac(addr: &[u8]) -> String {
    addr.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// One-line summary of a message's payload.
pub fn describe(message: &Message) -> String {
    match message {
        Message::Break | Message::DumpIfinfo | Message::DumpFibinfo => String::new(),
        Message::LinkStat(s) => {
            let name = LINK_STAT_NAMES
                .get(s.index as usize)
                .copied()
                .unwrap_or("?");
            format!("{name}={}", s.count)
        }
        Message::EthtoolStat(s) => format!("index={} count={}", s.index, s.count),
        Message::EthtoolFlags(f) => format!("flags={:#x}", f.flags),
        Message::EthtoolSettings(s) => format!(
            "speed={} duplex={} autoneg={}",
            s.speed, s.duplex, s.autoneg
        ),
        Message::Carrier(c) => (if c.on { "on" } else { "off" }).to_string(),
        Message::Speed(s) => format!("{} Mb/s", s.mbps),
        Message::Ifinfo(i) => format!(
            "{} net={} devtype={} reason={} flags={:#x} addr={}",
            i.ifname,
            i.net,
            i.devtype,
            i.reason,
            i.flags,
            mac(&i.addr)
        ),
        Message::Ifa(a) => {
            let event = match a.event {
                ifa_event::UP => "up",
                ifa_event::DOWN => "down",
                _ => "?",
            };
            format!("{}/{} {event}", a.address, a.mask)
        }
        Message::FibEntry(f) => format!(
            "{}/{} table={} type={} nhs={}",
            f.address,
            f.mask,
            f.table,
            f.route_type,
            f.next_hops.len()
        ),
        Message::Ifdel(d) => format!("devtype={}", d.devtype),
        Message::NeighUpdate(n) => {
            let dst = match n.len {
                4 => Ipv4Addr::new(n.dst[0], n.dst[1], n.dst[2], n.dst[3]).to_string(),
                _ => Ipv6Addr::from(n.dst).to_string(),
            };
            format!("{dst} lladdr={}", mac(&n.lladdr))
        }
        Message::Ifvid(v) => format!(
            "vid={} {}",
            v.vid,
            if v.added { "added" } else { "removed" }
        ),
        Message::ChangeUpper(u) => format!(
            "upper={} lower={} {}",
            u.upper,
            u.lower,
            if u.linking { "linking" } else { "unlinking" }
        ),
    }
}

pub fn print_message(message: &Message, format: OutputFormat) {
    let kind = message.kind();
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: kind.name(),
                ifindex: message.ifindex(),
                detail: describe(message),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "IFINDEX", "DETAIL"])
                .add_row(vec![
                    kind.name().to_string(),
                    message
                        .ifindex()
                        .map(|i| i.to_string())
                        .unwrap_or_default(),
                    describe(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match message.ifindex() {
            Some(ifindex) => println!("{kind} ifindex={ifindex} {}", describe(message)),
            None => println!("{kind} {}", describe(message)),
        },
    }
}

pub fn print_opaque(len: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{{\"kind\":\"opaque\",\"len\":{len},\"timestamp\":\"{}\"}}",
            now_unix_seconds()
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!("opaque len={len}"),
    }
}

pub fn print_counters(counters: &CounterSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(counters).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in counters.entries() {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (name, value) in counters.entries() {
                println!("{name}: {value}");
            }
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use xethsb_frame::{Carrier, Ifa, Stat};

    use super::*;

    #[test]
    fn link_stat_uses_stat_name() {
        let detail = describe(&Message::LinkStat(Stat {
            ifindex: 3,
            index: 0,
            count: 42,
        }));
        assert_eq!(detail, format!("{}=42", LINK_STAT_NAMES[0]));
    }

    #[test]
    fn carrier_and_ifa_details() {
        assert_eq!(
            describe(&Message::Carrier(Carrier {
                ifindex: 1,
                on: false
            })),
            "off"
        );
        let ifa = Message::Ifa(Ifa {
            ifindex: 1,
            event: ifa_event::UP,
            address: Ipv4Addr::new(10, 0, 0, 1),
            mask: Ipv4Addr::new(255, 0, 0, 0),
        });
        assert_eq!(describe(&ifa), "10.0.0.1/255.0.0.0 up");
    }

    #[test]
    fn mac_is_colon_separated() {
        assert_eq!(mac(&[0x02, 0, 0xab, 0, 0, 0x0c]), "02:00:ab:00:00:0c");
    }
}
