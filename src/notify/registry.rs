//! Subscription registry and synchronous dispatch.
//!
//! Dispatch happens on the mutating thread, after the store has released its
//! state lock, so handlers may read the store. A dispatch mutex serializes
//! deliveries: every subscriber observes events in sequence order, and
//! `cancel` can wait out an in-flight delivery before returning.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::{bounded, TrySendError};

use crate::document::Document;

use super::event::{ChangeEvent, ChangeKind, SubscriptionId};
use super::stream::ChangeStream;

type Handler = dyn Fn(&ChangeEvent) + Send + Sync;

thread_local! {
    // Registries currently dispatching on this thread (by address).
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct DispatchScope {
    key: usize,
}

impl DispatchScope {
    fn enter(key: usize) -> Self {
        DISPATCHING.with(|d| d.borrow_mut().push(key));
        Self { key }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|d| {
            let mut d = d.borrow_mut();
            if let Some(pos) = d.iter().rposition(|k| *k == self.key) {
                d.remove(pos);
            }
        });
    }
}

struct SubscriberEntry {
    id: SubscriptionId,
    handler: Box<Handler>,
    active: AtomicBool,
}

impl fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("id", &self.id)
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    subscribers: RwLock<Vec<Arc<SubscriberEntry>>>,
    dispatch: Mutex<()>,
    sequence: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
    dropped_events: Arc<AtomicU64>,
}

impl Registry {
    fn key(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    pub(crate) fn is_dispatching_on_current_thread(&self) -> bool {
        let key = self.key();
        DISPATCHING.with(|d| d.borrow().contains(&key))
    }

    fn add(&self, handler: Box<Handler>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let entry = Arc::new(SubscriberEntry {
            id,
            handler,
            active: AtomicBool::new(true),
        });
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        id
    }

    pub(crate) fn cancel(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut subs = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
            subs.iter()
                .position(|e| e.id == id)
                .map(|pos| subs.remove(pos))
        };
        let Some(entry) = removed else {
            return false;
        };
        entry.active.store(false, Ordering::Release);

        // Wait for a delivery running on another thread. From inside a handler
        // the dispatch loop re-checks `active`, so no wait is needed (or possible).
        if !self.is_dispatching_on_current_thread() {
            drop(self.dispatch.lock().unwrap_or_else(PoisonError::into_inner));
        }
        true
    }
}

/// Per-store observer registry.
///
/// Created together with its store and dropped with it; there is no global
/// dispatch.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    registry: Arc<Registry>,
}

impl ChangeNotifier {
    /// Creates a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every subsequent mutation.
    ///
    /// Handlers run synchronously on the mutating thread and should return
    /// promptly. They may read the store but not mutate it.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.registry.add(Box::new(handler));
        tracing::debug!(subscription_id = %id, "change subscriber registered");
        id
    }

    /// Registers a bounded channel subscription.
    ///
    /// Events that do not fit in the buffer are dropped and counted in
    /// [`dropped_events`](Self::dropped_events).
    pub fn subscribe_stream(&self, capacity: usize) -> ChangeStream {
        let (tx, rx) = bounded::<ChangeEvent>(capacity.max(1));
        let dropped = Arc::clone(&self.registry.dropped_events);

        let id = self.registry.add(Box::new(move |event: &ChangeEvent| {
            match tx.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(ev)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(sequence = ev.sequence, "change stream full; event dropped");
                }
            }
        }));
        tracing::debug!(subscription_id = %id, "change stream registered");

        ChangeStream::new(id, rx, Arc::downgrade(&self.registry))
    }

    /// Deregisters a subscription.
    ///
    /// Idempotent; returns false if nothing was registered under `id`. Once
    /// this returns, the handler is not invoked again.
    pub fn cancel(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.cancel(id);
        if removed {
            tracing::debug!(subscription_id = %id, "change subscriber cancelled");
        }
        removed
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sequence number of the last published event (0 before the first).
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.registry.sequence.load(Ordering::Acquire)
    }

    /// Successful handler invocations so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.registry.delivered.load(Ordering::Relaxed)
    }

    /// Handler invocations that panicked.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.registry.handler_failures.load(Ordering::Relaxed)
    }

    /// Stream events dropped because a subscriber's buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.registry.dropped_events.load(Ordering::Relaxed)
    }

    pub(crate) fn is_dispatching_on_current_thread(&self) -> bool {
        self.registry.is_dispatching_on_current_thread()
    }

    /// Delivers one event to every active subscriber and returns its sequence.
    pub(crate) fn publish(&self, kind: ChangeKind, documents: Arc<[Document]>) -> u64 {
        let registry = &self.registry;
        let _dispatch = registry.dispatch.lock().unwrap_or_else(PoisonError::into_inner);

        let sequence = registry.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let event = ChangeEvent::new(sequence, kind, documents);

        let subscribers: Vec<Arc<SubscriberEntry>> = registry
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let _scope = DispatchScope::enter(registry.key());
        for entry in subscribers {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(&event))) {
                Ok(()) => {
                    registry.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    registry.handler_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subscription_id = %entry.id,
                        sequence,
                        "change handler panicked; remaining subscribers still notified"
                    );
                }
            }
        }

        sequence
    }
}
