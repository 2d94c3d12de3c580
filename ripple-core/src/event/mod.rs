//! Typed Event Bus
//!
//! A per-instance publish/subscribe registry with synchronous fan-out.
//! Effects use one bus each to expose their lifecycle hooks (track,
//! untrack, before-run, dispose, ...), but the bus itself is generic over
//! any event type.
//!
//! Events implement [`Event`], which names the key (`Kind`) a handler
//! registers under. Emission is synchronous: `emit` invokes every handler
//! registered for the event's kind, in registration order, and collects
//! their return values. Handlers registered with [`EventBus::once`] are
//! removed before their single invocation.
//!
//! The handler table lock is never held while a handler runs, so handlers
//! may re-enter the bus (registering, emitting, or clearing) freely.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

/// An event that can be published on an [`EventBus`].
pub trait Event {
    /// The key handlers register under.
    type Kind: Copy + Eq + Hash;

    /// The kind of this particular event value.
    fn kind(&self) -> Self::Kind;
}

/// Identifier for a registered handler, used to unregister it.
///
/// Closures have no identity of their own, so registration hands one out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Handler<E, R> {
    id: HandlerId,
    once: bool,
    invoke: Arc<dyn Fn(&E) -> R + Send + Sync>,
}

impl<E, R> Clone for Handler<E, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            invoke: Arc::clone(&self.invoke),
        }
    }
}

/// A typed publish/subscribe bus with synchronous emission.
pub struct EventBus<E: Event, R = ()> {
    handlers: Mutex<HashMap<E::Kind, Vec<Handler<E, R>>>>,
}

impl<E: Event, R> EventBus<E, R> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a handler for every future event of `kind`.
    pub fn on<F>(&self, kind: E::Kind, handler: F) -> HandlerId
    where
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        self.insert(kind, handler, false)
    }

    /// Register a handler that is removed before its first invocation.
    pub fn once<F>(&self, kind: E::Kind, handler: F) -> HandlerId
    where
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        self.insert(kind, handler, true)
    }

    fn insert<F>(&self, kind: E::Kind, handler: F, once: bool) -> HandlerId
    where
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.handlers.lock().entry(kind).or_default().push(Handler {
            id,
            once,
            invoke: Arc::new(handler),
        });
        id
    }

    /// Publish an event to every handler of its kind, in registration
    /// order, collecting their return values. Emitting a kind with no
    /// handlers is a no-op.
    pub fn emit(&self, event: &E) -> Vec<R> {
        // Snapshot under the lock, invoke outside it: handlers may
        // re-enter the bus.
        let batch: SmallVec<[Handler<E, R>; 4]> = {
            let mut handlers = self.handlers.lock();
            match handlers.get_mut(&event.kind()) {
                Some(entries) => {
                    let batch = entries.iter().cloned().collect();
                    entries.retain(|handler| !handler.once);
                    batch
                }
                None => SmallVec::new(),
            }
        };

        batch
            .iter()
            .map(|handler| (handler.invoke)(event))
            .collect()
    }

    /// Unregister a single handler. Returns whether it was present.
    pub fn off(&self, kind: E::Kind, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        match handlers.get_mut(&kind) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|handler| handler.id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Unregister every handler for `kind`.
    pub fn off_all(&self, kind: E::Kind) {
        self.handlers.lock().remove(&kind);
    }

    /// Whether any handler is registered for `kind`.
    pub fn has(&self, kind: E::Kind) -> bool {
        self.handlers
            .lock()
            .get(&kind)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Unregister every handler for every kind.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

impl<E: Event, R> Default for EventBus<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[derive(Debug)]
    enum Lifecycle {
        Opened(i32),
        Closed,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum LifecycleKind {
        Opened,
        Closed,
    }

    impl Event for Lifecycle {
        type Kind = LifecycleKind;

        fn kind(&self) -> LifecycleKind {
            match self {
                Lifecycle::Opened(_) => LifecycleKind::Opened,
                Lifecycle::Closed => LifecycleKind::Closed,
            }
        }
    }

    #[test]
    fn emit_reaches_registered_handlers_in_order() {
        let bus: EventBus<Lifecycle, i32> = EventBus::new();

        bus.on(LifecycleKind::Opened, |event| match event {
            Lifecycle::Opened(n) => *n,
            Lifecycle::Closed => -1,
        });
        bus.on(LifecycleKind::Opened, |_| 100);

        let collected = bus.emit(&Lifecycle::Opened(7));
        assert_eq!(collected, vec![7, 100]);
    }

    #[test]
    fn emit_without_handlers_is_a_noop() {
        let bus: EventBus<Lifecycle> = EventBus::new();
        assert!(bus.emit(&Lifecycle::Closed).is_empty());
        assert!(!bus.has(LifecycleKind::Closed));
    }

    #[test]
    fn once_handler_fires_exactly_once() {
        let bus: EventBus<Lifecycle> = EventBus::new();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_clone = calls.clone();
        bus.once(LifecycleKind::Closed, move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&Lifecycle::Closed);
        bus.emit(&Lifecycle::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!bus.has(LifecycleKind::Closed));
    }

    #[test]
    fn off_removes_only_the_named_handler() {
        let bus: EventBus<Lifecycle> = EventBus::new();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_a = calls.clone();
        let a = bus.on(LifecycleKind::Closed, move |_| {
            calls_a.fetch_add(1, Ordering::SeqCst);
        });
        let calls_b = calls.clone();
        bus.on(LifecycleKind::Closed, move |_| {
            calls_b.fetch_add(10, Ordering::SeqCst);
        });

        assert!(bus.off(LifecycleKind::Closed, a));
        assert!(!bus.off(LifecycleKind::Closed, a));

        bus.emit(&Lifecycle::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn clear_removes_every_handler() {
        let bus: EventBus<Lifecycle> = EventBus::new();
        bus.on(LifecycleKind::Opened, |_| {});
        bus.on(LifecycleKind::Closed, |_| {});

        bus.clear();
        assert!(!bus.has(LifecycleKind::Opened));
        assert!(!bus.has(LifecycleKind::Closed));
    }

    #[test]
    fn handlers_may_reenter_the_bus() {
        let bus: Arc<EventBus<Lifecycle>> = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicI32::new(0));

        let bus_clone = bus.clone();
        let calls_clone = calls.clone();
        bus.on(LifecycleKind::Opened, move |_| {
            let inner = calls_clone.clone();
            bus_clone.once(LifecycleKind::Closed, move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            });
        });

        bus.emit(&Lifecycle::Opened(0));
        bus.emit(&Lifecycle::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
