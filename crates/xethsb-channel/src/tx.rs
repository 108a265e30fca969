use std::io;
use std::time::Duration;

use tracing::trace;

use crate::session::{is_disconnect, Session, WorkerExit};

/// Exponential idle backoff for the TX worker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    pub(crate) fn current(&self) -> Duration {
        self.current
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.min;
    }

    pub(crate) fn grow(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }
}

/// Drain the outbound queue into the link.
///
/// A full socket buffer puts the frame back at the head and waits. An
/// empty queue waits with a doubling interval that resets after each
/// successful send.
pub(crate) fn run(session: &Session) -> WorkerExit {
    let ctx = &session.ctx;
    let counters = &ctx.counters;
    let mut backoff = Backoff::new(ctx.config.min_backoff, ctx.config.max_backoff);

    let exit = loop {
        if session.cancel.is_cancelled() {
            break WorkerExit::Cancelled;
        }
        counters.tx_ticks.inc();

        let Some(frame) = ctx.queue.pop_front() else {
            session.cancel.sleep(backoff.current());
            backoff.grow();
            continue;
        };

        match session.link.try_send(&frame) {
            Ok(0) => break WorkerExit::PeerClosed,
            Ok(n) => {
                trace!(len = n, "sent");
                counters.sent.inc();
                backoff.reset();
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                counters.retries.inc();
                ctx.queue.push_front(frame);
                session.cancel.sleep(backoff.current());
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                ctx.queue.push_front(frame);
            }
            Err(err) if is_disconnect(&err) => break WorkerExit::PeerClosed,
            Err(err) => break WorkerExit::Failed(err),
        }
    };

    session.cancel.cancel();
    exit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_to_ceiling_and_resets() {
        let mut b = Backoff::new(Duration::from_millis(10), Duration::from_millis(320));
        let mut seen = vec![b.current()];
        for _ in 0..7 {
            b.grow();
            seen.push(b.current());
        }
        let ms: Vec<u128> = seen.iter().map(Duration::as_millis).collect();
        assert_eq!(ms, vec![10, 20, 40, 80, 160, 320, 320, 320]);

        b.reset();
        assert_eq!(b.current(), Duration::from_millis(10));
    }
}
