use std::io;
use std::sync::atomic::Ordering;
use std::thread;

use tracing::{debug, warn};
use xethsb_frame::{
    decode, is_message, Kind, Message, HEADER_SIZE, JUMBO_FRAME_SIZE, N_LINK_STATS,
};

use crate::announce;
use crate::device::Device;
use crate::error::{ChannelError, Result};
use crate::session::{is_disconnect, Session, WorkerExit};

/// Read controller datagrams and apply them until the link fails or the
/// session is cancelled.
pub(crate) fn run(session: &Session) -> WorkerExit {
    let counters = &session.ctx.counters;
    let mut buf = vec![0u8; JUMBO_FRAME_SIZE];

    let exit = loop {
        if session.cancel.is_cancelled() {
            break WorkerExit::Cancelled;
        }
        counters.rx_ticks.inc();

        let n = match session.link.recv(&mut buf) {
            Ok(0) => break WorkerExit::PeerClosed,
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                thread::yield_now();
                continue;
            }
            Err(err) if is_disconnect(&err) => break WorkerExit::PeerClosed,
            Err(err) => break WorkerExit::Failed(err),
        };

        counters.received.inc();
        handle_frame(session, &buf[..n]);
    };

    session.cancel.cancel();
    exit
}

/// Classify one datagram and count whatever goes wrong with it.
pub(crate) fn handle_frame(session: &Session, frame: &[u8]) {
    let ctx = &session.ctx;
    if frame.len() < HEADER_SIZE {
        ctx.counters.invalid.inc();
        warn!(len = frame.len(), "short frame from controller");
        return;
    }
    if !is_message(frame) {
        ctx.counters.opaque.inc();
        ctx.encap.on_opaque_frame(frame);
        return;
    }

    let result = decode(frame)
        .map_err(ChannelError::from)
        .and_then(|message| dispatch(session, message));
    match result {
        Ok(()) => {}
        Err(ChannelError::NoSuchDevice(ifindex)) => {
            ctx.counters.no_dev.inc();
            debug!(ifindex, "message for unknown device");
        }
        Err(err) => {
            ctx.counters.invalid.inc();
            warn!(%err, "invalid frame from controller");
        }
    }
}

fn device(session: &Session, ifindex: i32) -> Result<std::sync::Arc<Device>> {
    session
        .ctx
        .registry
        .lookup(ifindex)
        .ok_or(ChannelError::NoSuchDevice(ifindex))
}

fn dispatch(session: &Session, message: Message) -> Result<()> {
    let ctx = &session.ctx;
    match message {
        Message::Carrier(m) => {
            device(session, m.ifindex)?.set_carrier(m.on);
        }
        Message::LinkStat(m) => {
            let index = m.index as usize;
            if index >= N_LINK_STATS {
                return Err(ChannelError::InvalidStatIndex {
                    kind: Kind::LinkStat,
                    index: m.index,
                });
            }
            device(session, m.ifindex)?.set_link_stat(index, m.count);
        }
        Message::EthtoolStat(m) => {
            let index = m.index as usize;
            let invalid = ChannelError::InvalidStatIndex {
                kind: Kind::EthtoolStat,
                index: m.index,
            };
            if index >= ctx.registry.ethtool_stat_count() {
                return Err(invalid);
            }
            if !device(session, m.ifindex)?.set_ethtool_stat(index, m.count) {
                return Err(invalid);
            }
        }
        Message::Speed(m) => {
            device(session, m.ifindex)?.set_speed(m.mbps);
        }
        Message::DumpIfinfo => announce::dump_all(ctx),
        Message::DumpFibinfo => {
            if !session.fib_registered.swap(true, Ordering::SeqCst) {
                if let Err(err) = ctx.fib.register() {
                    warn!(%err, "fib notifier registration failed");
                    session.fib_registered.store(false, Ordering::SeqCst);
                }
            }
            ctx.events().send_break()?;
        }
        other => return Err(ChannelError::UnexpectedKind(other.kind())),
    }
    Ok(())
}
