use bytes::{BufMut, Bytes};

use crate::error::{FrameError, Result};
use crate::kind::Kind;
use crate::message::{
    fixed_payload_size, Carrier, ChangeUpper, EthtoolFlags, EthtoolSettings, FibEntry, Ifa,
    Ifdel, Ifinfo, Ifvid, Message, NeighUpdate, NextHop, Speed, Stat,
};

/// Frame header: zero signature (12) + kind (4) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Leading bytes that must be zero for a buffer to be a message.
pub const SIGNATURE_SIZE: usize = 12;

/// Largest frame produced or accepted on the channel.
pub const JUMBO_FRAME_SIZE: usize = 9728;

/// Returns true if `buf` carries the side-band message header signature.
///
/// Anything else sharing the socket is opaque traffic.
pub fn is_message(buf: &[u8]) -> bool {
    buf.len() >= HEADER_SIZE && buf[..SIGNATURE_SIZE].iter().all(|b| *b == 0)
}

/// Raw kind value of a message buffer, or `None` if it is not a message.
pub fn raw_kind(buf: &[u8]) -> Option<u32> {
    if !is_message(buf) {
        return None;
    }
    let mut kind = [0u8; 4];
    kind.copy_from_slice(&buf[SIGNATURE_SIZE..HEADER_SIZE]);
    Some(u32::from_be_bytes(kind))
}

/// Encode a message into a freshly allocated frame.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬────────────┬──────────────────────────┐
/// │ Signature (12B)    │ Kind       │ Payload                  │
/// │ all zero           │ (4B BE)    │ (fixed layout per kind)  │
/// └────────────────────┴────────────┴──────────────────────────┘
/// ```
pub fn encode(message: &Message) -> Result<Bytes> {
    if let Message::FibEntry(entry) = message {
        if entry.next_hops.len() > usize::from(u8::MAX) {
            return Err(FrameError::TooManyNextHops(entry.next_hops.len()));
        }
    }

    let size = HEADER_SIZE + message.payload_size();
    if size > JUMBO_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size,
            max: JUMBO_FRAME_SIZE,
        });
    }

    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| FrameError::Alloc(size))?;
    buf.put_bytes(0, SIGNATURE_SIZE);
    buf.put_u32(message.kind().as_u32());
    message.put_payload(&mut buf);
    debug_assert_eq!(buf.len(), size);

    Ok(Bytes::from(buf))
}

fn need(kind: Kind, len: usize, need: usize) -> Result<()> {
    if len < need {
        return Err(FrameError::Truncated {
            kind: kind.name(),
            len,
            need,
        });
    }
    Ok(())
}

/// Decode one frame.
///
/// Bytes beyond the kind's layout are ignored. A frame shorter than the
/// header or its kind's layout is [`FrameError::Truncated`].
pub fn decode(buf: &[u8]) -> Result<Message> {
    if buf.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            kind: "header",
            len: buf.len(),
            need: HEADER_SIZE,
        });
    }
    let raw = raw_kind(buf).ok_or(FrameError::NotMessage)?;
    let kind = Kind::from_u32(raw).ok_or(FrameError::UnknownKind(raw))?;

    let mut src = &buf[HEADER_SIZE..];
    need(kind, buf.len(), HEADER_SIZE + fixed_payload_size(kind))?;

    let message = match kind {
        Kind::Break => Message::Break,
        Kind::DumpIfinfo => Message::DumpIfinfo,
        Kind::DumpFibinfo => Message::DumpFibinfo,
        Kind::LinkStat => Message::LinkStat(Stat::get(&mut src)),
        Kind::EthtoolStat => Message::EthtoolStat(Stat::get(&mut src)),
        Kind::EthtoolFlags => Message::EthtoolFlags(EthtoolFlags::get(&mut src)),
        Kind::EthtoolSettings => Message::EthtoolSettings(EthtoolSettings::get(&mut src)),
        Kind::Carrier => Message::Carrier(Carrier::get(&mut src)),
        Kind::Speed => Message::Speed(Speed::get(&mut src)),
        Kind::Ifinfo => Message::Ifinfo(Ifinfo::get(&mut src)),
        Kind::Ifa => Message::Ifa(Ifa::get(&mut src)),
        Kind::FibEntry => {
            let (mut entry, nhs) = FibEntry::get_head(&mut src);
            need(
                kind,
                buf.len(),
                HEADER_SIZE + FibEntry::SIZE + nhs * NextHop::SIZE,
            )?;
            entry.get_hops(&mut src, nhs);
            Message::FibEntry(entry)
        }
        Kind::Ifdel => Message::Ifdel(Ifdel::get(&mut src)),
        Kind::NeighUpdate => Message::NeighUpdate(NeighUpdate::get(&mut src)),
        Kind::Ifvid => Message::Ifvid(Ifvid::get(&mut src)),
        Kind::ChangeUpper => Message::ChangeUpper(ChangeUpper::get(&mut src)),
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::message::{devtype, reason, ETH_ALEN};

    fn header(kind: u32) -> Vec<u8> {
        let mut buf = vec![0u8; SIGNATURE_SIZE];
        buf.extend_from_slice(&kind.to_be_bytes());
        buf
    }

    #[test]
    fn break_is_header_only() {
        let frame = encode(&Message::Break).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE);
        assert!(is_message(&frame));
        assert_eq!(raw_kind(&frame), Some(0));
        assert_eq!(decode(&frame).unwrap(), Message::Break);
    }

    #[test]
    fn carrier_layout_is_network_order() {
        let frame = encode(&Message::Carrier(Carrier {
            ifindex: 5,
            on: true,
        }))
        .unwrap();
        assert_eq!(&frame[SIGNATURE_SIZE..HEADER_SIZE], &[0, 0, 0, 6]);
        assert_eq!(&frame[HEADER_SIZE..], &[0, 0, 0, 5, 1, 0, 0, 0]);
    }

    #[test]
    fn stat_decodes() {
        let mut buf = header(Kind::LinkStat.as_u32());
        buf.extend_from_slice(&7i32.to_be_bytes());
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&1234u64.to_be_bytes());

        let message = decode(&buf).unwrap();
        assert_eq!(
            message,
            Message::LinkStat(Stat {
                ifindex: 7,
                index: 2,
                count: 1234
            })
        );
        assert_eq!(message.ifindex(), Some(7));
    }

    #[test]
    fn fib_entry_with_next_hops() {
        let entry = FibEntry {
            net: 1,
            address: Ipv4Addr::new(10, 0, 0, 0),
            mask: FibEntry::prefix_mask(8),
            event: 1,
            tos: 0,
            route_type: 1,
            table: 254,
            next_hops: vec![
                NextHop {
                    ifindex: 3,
                    weight: 1,
                    flags: 0,
                    gw: Ipv4Addr::new(10, 0, 0, 1),
                    scope: 0,
                },
                NextHop {
                    ifindex: 4,
                    weight: 2,
                    flags: 0,
                    gw: Ipv4Addr::new(10, 0, 0, 2),
                    scope: 0,
                },
            ],
        };
        let frame = encode(&Message::FibEntry(entry.clone())).unwrap();
        assert_eq!(
            frame.len(),
            HEADER_SIZE + FibEntry::SIZE + 2 * NextHop::SIZE
        );
        assert_eq!(decode(&frame).unwrap(), Message::FibEntry(entry));
    }

    #[test]
    fn fib_entry_tail_shorter_than_count_is_truncated() {
        let entry = FibEntry {
            net: 1,
            address: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            event: 0,
            tos: 0,
            route_type: 0,
            table: 0,
            next_hops: vec![
                NextHop {
                    ifindex: 1,
                    weight: 0,
                    flags: 0,
                    gw: Ipv4Addr::UNSPECIFIED,
                    scope: 0,
                };
                3
            ],
        };
        let frame = encode(&Message::FibEntry(entry)).unwrap();
        let cut = &frame[..frame.len() - NextHop::SIZE];
        assert!(matches!(decode(cut), Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn too_many_next_hops_rejected() {
        let hop = NextHop {
            ifindex: 1,
            weight: 0,
            flags: 0,
            gw: Ipv4Addr::UNSPECIFIED,
            scope: 0,
        };
        let entry = FibEntry {
            net: 1,
            address: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            event: 0,
            tos: 0,
            route_type: 0,
            table: 0,
            next_hops: vec![hop; 256],
        };
        assert!(matches!(
            encode(&Message::FibEntry(entry)),
            Err(FrameError::TooManyNextHops(256))
        ));
    }

    #[test]
    fn largest_fib_entry_fits_jumbo() {
        let size = HEADER_SIZE + FibEntry::SIZE + 255 * NextHop::SIZE;
        assert!(size <= JUMBO_FRAME_SIZE);
    }

    #[test]
    fn decode_short_header() {
        let err = decode(&[0u8; HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { kind: "header", .. }));
    }

    #[test]
    fn decode_short_payload() {
        let mut buf = header(Kind::Speed.as_u32());
        buf.extend_from_slice(&[0, 0, 0, 1]);
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { kind: "speed", .. }));
    }

    #[test]
    fn decode_unknown_kind() {
        let buf = header(0x99);
        assert!(matches!(decode(&buf), Err(FrameError::UnknownKind(0x99))));
    }

    #[test]
    fn non_zero_signature_is_opaque() {
        let mut buf = header(Kind::Break.as_u32());
        buf[3] = 0x81;
        assert!(!is_message(&buf));
        assert_eq!(raw_kind(&buf), None);
        assert!(matches!(decode(&buf), Err(FrameError::NotMessage)));
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut buf = encode(&Message::Speed(Speed {
            ifindex: 9,
            mbps: 100_000,
        }))
        .unwrap()
        .to_vec();
        buf.extend_from_slice(&[0xAA; 8]);
        assert_eq!(
            decode(&buf).unwrap(),
            Message::Speed(Speed {
                ifindex: 9,
                mbps: 100_000
            })
        );
    }

    #[test]
    fn ifinfo_survives_codec() {
        let info = Ifinfo {
            ifname: "xeth1-2".to_string(),
            net: 1,
            ifindex: 12,
            iflinkindex: 2,
            flags: 0x1003,
            id: 7,
            portid: 1,
            portindex: 1,
            subportindex: 2,
            devtype: devtype::PORT,
            reason: reason::DUMP,
            addr: [0x02, 0, 0, 0, 0, 0x0c],
        };
        let frame = encode(&Message::Ifinfo(info.clone())).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE + Ifinfo::SIZE);
        let Message::Ifinfo(decoded) = decode(&frame).unwrap() else {
            panic!("expected ifinfo");
        };
        assert_eq!(decoded, info);
        assert_eq!(decoded.addr.len(), ETH_ALEN);
    }
}
