use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};
use xethsb_transport::{SeqpacketListener, SeqpacketStream, SocketName};

use crate::announce;
use crate::cancel::CancelToken;
use crate::collab::{Encapsulation, FibNotifier, NoEncapsulation, NoFibNotifier};
use crate::config::ChannelConfig;
use crate::context::{ChannelContext, ConnectionState};
use crate::counters::CounterSnapshot;
use crate::device::DeviceRegistry;
use crate::error::{ChannelError, Result};
use crate::events::EventSender;
use crate::session::Session;

/// Builder for a [`Channel`].
pub struct ChannelBuilder {
    config: ChannelConfig,
    registry: Arc<dyn DeviceRegistry>,
    encap: Arc<dyn Encapsulation>,
    fib: Arc<dyn FibNotifier>,
}

impl ChannelBuilder {
    /// Override channel config.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the encapsulation layer that shares the socket.
    pub fn with_encapsulation(mut self, encap: Arc<dyn Encapsulation>) -> Self {
        self.encap = encap;
        self
    }

    /// Attach the routing-table subscription used by `DUMP_FIBINFO`.
    pub fn with_fib_notifier(mut self, fib: Arc<dyn FibNotifier>) -> Self {
        self.fib = fib;
        self
    }

    /// Bind the rendezvous socket and start the listener thread.
    ///
    /// Bind failures are returned here rather than surfacing later from
    /// the background thread.
    pub fn start(self) -> Result<Channel> {
        self.config.validate()?;
        let listener = SeqpacketListener::bind_with_backlog(&self.config.name, self.config.backlog)?;
        let name = listener.name().clone();

        let ctx = Arc::new(ChannelContext::new(
            self.config,
            self.registry,
            self.encap,
            self.fib,
        ));
        ctx.set_state(ConnectionState::Accepting);

        let stop = CancelToken::new();
        let thread_ctx = Arc::clone(&ctx);
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("xeth".to_string())
            .spawn(move || accept_loop(&thread_ctx, listener, &thread_stop))
            .map_err(|source| {
                ctx.set_state(ConnectionState::Idle);
                ChannelError::Spawn {
                    name: "xeth".to_string(),
                    source,
                }
            })?;

        Ok(Channel {
            ctx,
            stop,
            listener: Some(handle),
            name,
        })
    }
}

/// Running side-band channel.
///
/// Serves one controller at a time on the rendezvous socket. Dropping the
/// channel stops it.
pub struct Channel {
    ctx: Arc<ChannelContext>,
    stop: CancelToken,
    listener: Option<JoinHandle<()>>,
    name: SocketName,
}

impl Channel {
    pub fn builder(registry: Arc<dyn DeviceRegistry>) -> ChannelBuilder {
        ChannelBuilder {
            config: ChannelConfig::default(),
            registry,
            encap: Arc::new(NoEncapsulation),
            fib: Arc::new(NoFibNotifier),
        }
    }

    /// Start with default collaborators.
    pub fn start(config: ChannelConfig, registry: Arc<dyn DeviceRegistry>) -> Result<Self> {
        Self::builder(registry).with_config(config).start()
    }

    /// Handle for enqueueing notifications.
    pub fn events(&self) -> EventSender {
        self.ctx.events()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.ctx.counters.snapshot()
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.state()
    }

    /// Bound rendezvous name.
    pub fn name(&self) -> &SocketName {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.queue.is_open()
    }

    /// Stop the listener and any active session. Blocks until the
    /// listener thread has exited and the socket is released.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                error!("listener thread panicked");
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(ctx: &Arc<ChannelContext>, listener: SeqpacketListener, stop: &CancelToken) {
    let name = listener.name().to_string();
    info!(%name, "listening");

    while !stop.is_cancelled() {
        match listener.accept() {
            Ok(Some(stream)) => serve(ctx, stream, stop),
            Ok(None) => {
                stop.sleep(ctx.config.accept_poll);
            }
            Err(err) => {
                warn!(%name, %err, "accept failed");
                stop.sleep(ctx.config.accept_poll);
            }
        }
    }

    drop(listener);
    ctx.set_state(ConnectionState::Idle);
    info!(%name, "stopped");
}

fn serve(ctx: &Arc<ChannelContext>, stream: SeqpacketStream, stop: &CancelToken) {
    if let Err(err) = stream.set_read_timeout(Some(ctx.config.rx_timeout)) {
        warn!(%err, "rejecting controller: cannot set read timeout");
        return;
    }

    match stream.peer_credentials() {
        Some(cred) => info!(uid = cred.uid, gid = cred.gid, pid = cred.pid, "controller connected"),
        None => info!("controller connected"),
    }

    ctx.registry.for_each_device(&mut |dev| dev.reset_stats());
    ctx.set_state(ConnectionState::Active);
    ctx.counters.connections.inc();
    ctx.queue.open();
    announce::dump_all(ctx);

    let session = Session::new(Arc::clone(ctx), Arc::new(stream));
    session.run(stop);

    ctx.set_state(ConnectionState::Accepting);
}
