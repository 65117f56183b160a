use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use super::event::{ChangeEvent, SubscriptionId};
use super::registry::Registry;

/// A channel-backed subscription to store changes.
///
/// Dropping the stream unsubscribes it.
#[derive(Debug)]
pub struct ChangeStream {
    subscription_id: SubscriptionId,
    rx: Receiver<ChangeEvent>,
    registry: Weak<Registry>,
    unregistered: AtomicBool,
}

impl ChangeStream {
    pub(crate) fn new(
        subscription_id: SubscriptionId,
        rx: Receiver<ChangeEvent>,
        registry: Weak<Registry>,
    ) -> Self {
        Self {
            subscription_id,
            rx,
            registry,
            unregistered: AtomicBool::new(false),
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Explicit unregistration. Idempotent.
    ///
    /// Events already buffered can still be received afterwards.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.cancel(self.subscription_id);
        }
    }

    /// Receive the next event, blocking.
    ///
    /// `None` once unsubscribed (or the store is gone) and the buffer is drained.
    #[must_use]
    pub fn recv(&self) -> Option<ChangeEvent> {
        self.rx.recv().ok()
    }

    /// Receive the next event with a timeout. `None` on timeout or disconnect.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receive a buffered event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drains every buffered event.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
