use xethsb_frame::{encode, Carrier, Message, Speed, Stat, LINK_STAT_NAMES};
use xethsb_transport::SeqpacketStream;

use crate::cmd::{CarrierState, SendArgs, SendMessage};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

/// Resolve a link stat given by name or by index.
pub fn link_stat_index(stat: &str) -> CliResult<u32> {
    if let Some(pos) = LINK_STAT_NAMES.iter().position(|name| *name == stat) {
        return Ok(pos as u32);
    }
    match stat.parse::<u32>() {
        Ok(index) if (index as usize) < LINK_STAT_NAMES.len() => Ok(index),
        _ => Err(CliError::new(
            USAGE,
            format!("unknown link stat {stat:?}; expected a name such as rx-packets or an index below {}", LINK_STAT_NAMES.len()),
        )),
    }
}

pub fn to_message(message: &SendMessage) -> CliResult<Message> {
    Ok(match *message {
        SendMessage::Carrier { ifindex, state } => Message::Carrier(Carrier {
            ifindex,
            on: state == CarrierState::On,
        }),
        SendMessage::LinkStat {
            ifindex,
            ref stat,
            count,
        } => Message::LinkStat(Stat {
            ifindex,
            index: link_stat_index(stat)?,
            count,
        }),
        SendMessage::EthtoolStat {
            ifindex,
            index,
            count,
        } => Message::EthtoolStat(Stat {
            ifindex,
            index,
            count,
        }),
        SendMessage::Speed { ifindex, mbps } => Message::Speed(Speed { ifindex, mbps }),
        SendMessage::DumpIfinfo => Message::DumpIfinfo,
        SendMessage::DumpFibinfo => Message::DumpFibinfo,
    })
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let message = to_message(&args.message)?;
    let frame = encode(&message).map_err(|err| frame_error("encode failed", err))?;

    let stream =
        SeqpacketStream::connect(&args.name).map_err(|err| transport_error("connect failed", err))?;
    stream
        .send(&frame)
        .map_err(|err| io_error("send failed", err))?;

    print_message(&message, format);
    Ok(SUCCESS)
}
