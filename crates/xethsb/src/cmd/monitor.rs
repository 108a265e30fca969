use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use xethsb_frame::{decode, encode, is_message, Message, JUMBO_FRAME_SIZE};
use xethsb_transport::{SeqpacketStream, SocketName};

use crate::cmd::{parse_duration, MonitorArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, print_opaque, OutputFormat};

const POLL: Duration = Duration::from_millis(100);

/// Connect, retrying until `timeout` has passed.
pub fn connect_with_retry(name: &SocketName, timeout: Duration) -> CliResult<SeqpacketStream> {
    let start = Instant::now();
    loop {
        match SeqpacketStream::connect(name) {
            Ok(stream) => return Ok(stream),
            Err(err) if start.elapsed() >= timeout => {
                return Err(transport_error("connect failed", err));
            }
            Err(_) => thread::sleep(Duration::from_millis(25)),
        }
    }
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let stream = connect_with_retry(&args.name, connect_timeout)?;
    stream
        .set_read_timeout(Some(POLL))
        .map_err(|err| transport_error("set read timeout failed", err))?;

    if args.fib {
        let frame =
            encode(&Message::DumpFibinfo).map_err(|err| frame_error("encode failed", err))?;
        stream
            .send(&frame)
            .map_err(|err| io_error("send failed", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut buf = vec![0u8; JUMBO_FRAME_SIZE];
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let n = match stream.recv(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(err) => return Err(io_error("receive failed", err)),
        };

        let frame = &buf[..n];
        if !is_message(frame) {
            print_opaque(n, format);
            continue;
        }
        let message = decode(frame).map_err(|err| frame_error("decode failed", err))?;
        print_message(&message, format);
        printed = printed.saturating_add(1);

        if args.until_break && message == Message::Break {
            break;
        }
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
