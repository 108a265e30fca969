//! Hooks into the layers the channel does not own.

use crate::events::EventSender;

/// Encapsulation layer that shares the socket and owns bridge devices.
pub trait Encapsulation: Send + Sync {
    /// A received frame without the message signature.
    fn on_opaque_frame(&self, frame: &[u8]) {
        let _ = frame;
    }

    /// Announce the devices this layer owns during a full dump.
    fn dump_associated_devices(&self, events: &EventSender) {
        let _ = events;
    }
}

/// Encapsulation that ignores opaque traffic and owns nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncapsulation;

impl Encapsulation for NoEncapsulation {}

/// Subscription to routing-table change notifications.
///
/// The channel registers at most once per controller session and
/// unregisters on teardown.
pub trait FibNotifier: Send + Sync {
    fn register(&self) -> std::io::Result<()>;
    fn unregister(&self);
}

/// FIB notifier with nothing behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFibNotifier;

impl FibNotifier for NoFibNotifier {
    fn register(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn unregister(&self) {}
}
