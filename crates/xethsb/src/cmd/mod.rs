use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use xethsb_transport::SocketName;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the mux side of the channel over devices from a JSON file.
    Serve(ServeArgs),
    /// Connect as the controller and print received messages.
    Monitor(MonitorArgs),
    /// Connect as the controller and send one message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Rendezvous socket: `@name` for an abstract name, otherwise a path.
    #[arg(long, env = "XETHSB_NAME", default_value = "@xeth")]
    pub name: SocketName,
    /// JSON file describing devices, upper links, and ethtool stat names.
    #[arg(long, env = "XETHSB_DEVICES", value_name = "FILE")]
    pub devices: Option<PathBuf>,
    /// Pending connection backlog.
    #[arg(long, env = "XETHSB_BACKLOG", default_value_t = 3)]
    pub backlog: i32,
    /// Shortest TX idle backoff (e.g. 10ms).
    #[arg(long, env = "XETHSB_MIN_BACKOFF", default_value = "10ms")]
    pub min_backoff: String,
    /// Longest TX idle backoff.
    #[arg(long, env = "XETHSB_MAX_BACKOFF", default_value = "320ms")]
    pub max_backoff: String,
    /// RX receive timeout.
    #[arg(long, env = "XETHSB_RX_TIMEOUT", default_value = "10ms")]
    pub rx_timeout: String,
    /// Sleep between accept attempts.
    #[arg(long, env = "XETHSB_ACCEPT_POLL", default_value = "100ms")]
    pub accept_poll: String,
    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long, value_name = "DURATION")]
    pub exit_after: Option<String>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Rendezvous socket to connect to.
    #[arg(long, env = "XETHSB_NAME", default_value = "@xeth")]
    pub name: SocketName,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after the first end-of-dump marker.
    #[arg(long)]
    pub until_break: bool,
    /// Subscribe to FIB updates after connecting.
    #[arg(long)]
    pub fib: bool,
    /// Keep retrying the connection for this long (e.g. 3s).
    #[arg(long, default_value = "0ms")]
    pub connect_timeout: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CarrierState {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum SendMessage {
    /// Set a port's carrier.
    Carrier { ifindex: i32, state: CarrierState },
    /// Write one link statistic. STAT is a name (e.g. rx-packets) or index.
    LinkStat {
        ifindex: i32,
        stat: String,
        count: u64,
    },
    /// Write one ethtool statistic by index.
    EthtoolStat {
        ifindex: i32,
        index: u32,
        count: u64,
    },
    /// Set a port's speed in Mb/s.
    Speed { ifindex: i32, mbps: u32 },
    /// Request a full re-announcement.
    DumpIfinfo,
    /// Subscribe to FIB updates.
    DumpFibinfo,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Rendezvous socket to connect to.
    #[arg(long, env = "XETHSB_NAME", default_value = "@xeth", global = true)]
    pub name: SocketName,
    #[command(subcommand)]
    pub message: SendMessage,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `2s`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Like [`parse_duration`] but rejects zero.
pub fn parse_interval(flag: &str, input: &str) -> CliResult<Duration> {
    let value = parse_duration(input)?;
    if value.is_zero() {
        return Err(CliError::new(
            USAGE,
            format!("--{flag} must be greater than zero"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_interval_rejects_zero_and_garbage() {
        assert!(parse_interval("rx-timeout", "0s").is_err());
        assert!(parse_interval("rx-timeout", "bad").is_err());
        assert!(parse_interval("rx-timeout", "").is_err());
    }
}
