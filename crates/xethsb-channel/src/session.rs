//! One controller connection: RX and TX workers plus teardown.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};
use xethsb_transport::SeqpacketStream;

use crate::cancel::CancelToken;
use crate::context::{ChannelContext, ConnectionState};
use crate::{rx, tx};

/// Datagram link to the controller.
pub trait Link: Send + Sync {
    /// Non-blocking send of one whole datagram.
    fn try_send(&self, frame: &[u8]) -> io::Result<usize>;
    /// Receive one datagram, honoring the link's read timeout.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
    /// Shut the link down.
    fn close(&self);
}

impl Link for SeqpacketStream {
    fn try_send(&self, frame: &[u8]) -> io::Result<usize> {
        SeqpacketStream::try_send(self, frame)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        SeqpacketStream::recv(self, buf)
    }

    fn close(&self) {
        if let Err(err) = self.shutdown() {
            debug!(%err, "shutdown after session");
        }
    }
}

/// Why a worker loop ended.
#[derive(Debug)]
pub(crate) enum WorkerExit {
    Cancelled,
    PeerClosed,
    Failed(io::Error),
}

pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    )
}

/// State shared by the two workers of one session.
pub(crate) struct Session {
    pub(crate) ctx: Arc<ChannelContext>,
    pub(crate) link: Arc<dyn Link>,
    pub(crate) cancel: CancelToken,
    pub(crate) fib_registered: AtomicBool,
}

impl Session {
    pub(crate) fn new(ctx: Arc<ChannelContext>, link: Arc<dyn Link>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            link,
            cancel: CancelToken::new(),
            fib_registered: AtomicBool::new(false),
        })
    }

    fn spawn(
        self: &Arc<Self>,
        name: &str,
        worker: fn(&Session) -> WorkerExit,
    ) -> Option<JoinHandle<WorkerExit>> {
        let session = Arc::clone(self);
        match thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker(&session))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(name, %err, "failed to spawn worker");
                self.cancel.cancel();
                None
            }
        }
    }

    /// Run both workers until either ends or `stop` is raised, then tear
    /// the session down.
    pub(crate) fn run(self: &Arc<Self>, stop: &CancelToken) {
        let rx = self.spawn("xeth-rx", rx::run);
        let tx = self.spawn("xeth-tx", tx::run);

        let finished =
            |h: &Option<JoinHandle<WorkerExit>>| h.as_ref().is_none_or(JoinHandle::is_finished);
        let mut draining = false;
        loop {
            if stop.is_cancelled() {
                self.cancel.cancel();
            }
            let (rx_done, tx_done) = (finished(&rx), finished(&tx));
            if !draining && (rx_done || tx_done) {
                self.ctx.set_state(ConnectionState::Draining);
                draining = true;
            }
            if rx_done && tx_done {
                break;
            }
            thread::sleep(self.ctx.config.teardown_poll);
        }

        for (name, handle) in [("rx", rx), ("tx", tx)] {
            let Some(handle) = handle else { continue };
            match handle.join() {
                Ok(WorkerExit::Cancelled) => debug!(worker = name, "cancelled"),
                Ok(WorkerExit::PeerClosed) => debug!(worker = name, "peer closed"),
                Ok(WorkerExit::Failed(err)) => warn!(worker = name, %err, "worker failed"),
                Err(_) => error!(worker = name, "worker panicked"),
            }
        }

        self.teardown();
    }

    pub(crate) fn teardown(&self) {
        let ctx = &self.ctx;
        ctx.set_state(ConnectionState::Draining);
        ctx.counters.connections.dec();
        self.link.close();
        if self.fib_registered.swap(false, Ordering::SeqCst) {
            ctx.fib.unregister();
        }
        ctx.registry.for_each_device(&mut |dev| dev.set_carrier(false));
        let discarded = ctx.queue.drain_all();
        info!(discarded, "session closed");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::collab::{FibNotifier, NoEncapsulation};
    use crate::config::ChannelConfig;
    use crate::device::{DeviceInfo, DeviceKind, Registry, DEFAULT_NET};

    /// In-memory link with scripted send failures.
    #[derive(Default)]
    pub(crate) struct ScriptedLink {
        pub(crate) sent: Mutex<Vec<Vec<u8>>>,
        pub(crate) send_errors: Mutex<VecDeque<io::ErrorKind>>,
        pub(crate) inbound: Mutex<VecDeque<Vec<u8>>>,
        pub(crate) closed: AtomicBool,
        /// While set, `try_send` blocks.
        pub(crate) hold_sends: AtomicBool,
    }

    impl ScriptedLink {
        pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Link for ScriptedLink {
        fn try_send(&self, frame: &[u8]) -> io::Result<usize> {
            while self.hold_sends.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            if let Some(kind) = self.send_errors.lock().unwrap().pop_front() {
                return Err(kind.into());
            }
            self.sent.lock().unwrap().push(frame.to_vec());
            Ok(frame.len())
        }

        fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(0);
            }
            match self.inbound.lock().unwrap().pop_front() {
                Some(frame) => {
                    buf[..frame.len()].copy_from_slice(&frame);
                    Ok(frame.len())
                }
                None => {
                    thread::sleep(Duration::from_millis(1));
                    Err(io::ErrorKind::WouldBlock.into())
                }
            }
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// FIB notifier that counts calls and optionally refuses to register.
    #[derive(Default)]
    pub(crate) struct CountingFib {
        pub(crate) fail: bool,
        pub(crate) registers: AtomicUsize,
        pub(crate) unregisters: AtomicUsize,
    }

    impl FibNotifier for CountingFib {
        fn register(&self) -> io::Result<()> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(io::Error::other("notifier unavailable"));
            }
            Ok(())
        }

        fn unregister(&self) {
            self.unregisters.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn port(ifindex: i32) -> DeviceInfo {
        DeviceInfo {
            ifindex,
            name: format!("xeth{ifindex}"),
            iflink: None,
            net: DEFAULT_NET,
            addr: [2, 0, 0, 0, 0, ifindex as u8],
            kind: DeviceKind::Port {
                id: 3000,
                portid: ifindex,
                port: ifindex as i16,
                subport: -1,
                devtype: 0,
            },
        }
    }

    /// A connected context, as the listener leaves it before starting
    /// the workers.
    pub(crate) fn connected(
        registry: Arc<Registry>,
        fib: Arc<dyn FibNotifier>,
    ) -> Arc<ChannelContext> {
        let ctx = Arc::new(ChannelContext::new(
            ChannelConfig::default(),
            registry,
            Arc::new(NoEncapsulation),
            fib,
        ));
        ctx.set_state(ConnectionState::Active);
        ctx.counters.connections.inc();
        ctx.queue.open();
        ctx
    }

    pub(crate) fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(2));
        }
    }
}
