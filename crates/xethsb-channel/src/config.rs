use std::time::Duration;

use xethsb_transport::SocketName;

use crate::error::{ChannelError, Result};

/// Upper bound for any poll interval that gates cancellation.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a side-band channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Rendezvous socket name. Default: abstract `@xeth`.
    pub name: SocketName,
    /// Pending-but-unaccepted connection backlog. Default: 3.
    pub backlog: i32,
    /// TX sleep after a successful send or first empty poll. Default: 10ms.
    pub min_backoff: Duration,
    /// Ceiling for the doubling TX backoff. Default: 320ms.
    pub max_backoff: Duration,
    /// RX receive timeout. Default: 10ms.
    pub rx_timeout: Duration,
    /// Sleep between accept attempts when no controller is pending. Default: 100ms.
    pub accept_poll: Duration,
    /// Interval at which the listener checks for worker exit. Default: 10ms.
    pub teardown_poll: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: SocketName::default(),
            backlog: 3,
            min_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(320),
            rx_timeout: Duration::from_millis(10),
            accept_poll: Duration::from_millis(100),
            teardown_poll: Duration::from_millis(10),
        }
    }
}

impl ChannelConfig {
    /// Check the invariants the workers rely on.
    pub fn validate(&self) -> Result<()> {
        if self.backlog <= 0 {
            return Err(ChannelError::InvalidConfig(format!(
                "backlog must be positive, got {}",
                self.backlog
            )));
        }
        if self.min_backoff.is_zero() || self.min_backoff > self.max_backoff {
            return Err(ChannelError::InvalidConfig(format!(
                "backoff range {:?}..{:?} is empty",
                self.min_backoff, self.max_backoff
            )));
        }
        for (what, value) in [
            ("rx timeout", self.rx_timeout),
            ("accept poll", self.accept_poll),
            ("teardown poll", self.teardown_poll),
        ] {
            if value.is_zero() || value > MAX_POLL_INTERVAL {
                return Err(ChannelError::InvalidConfig(format!(
                    "{what} must be in (0, {MAX_POLL_INTERVAL:?}], got {value:?}"
                )));
            }
        }
        Ok(())
    }
}
