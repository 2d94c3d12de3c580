//! Effect Implementation
//!
//! An Effect is a re-runnable unit of work. While it runs, signal reads
//! are attributed to it; when one of those signals later changes, the
//! effect is submitted to its scheduler (or re-run inline when it has
//! none).
//!
//! # Lifecycle of a run
//!
//! 1. The effect pushes itself onto the thread's running-effect stack.
//!    A duplicate push (the effect is already running) skips the run.
//! 2. `BeforeClean` is emitted, then all pending cleanups run and are
//!    cleared.
//! 3. `BeforeRun` is emitted and the callback executes.
//! 4. `AfterRun` is emitted with the callback's result, the stack entry
//!    is popped, and the result is returned.
//!
//! # Cleanup
//!
//! Cleanups are registered explicitly: through [`Effect::add`], through
//! [`on_cleanup`](super::context::on_cleanup) from inside a run, or by
//! returning a [`Teardown`] from a scoped effect's setup step. They run
//! before the next run and once more on disposal. Registering a cleanup
//! on a disposed effect invokes it immediately.
//!
//! # Disposal
//!
//! `dispose` is terminal: it runs pending cleanups, emits `Dispose`,
//! makes every observer that tracked the effect forget it, and clears
//! the event bus. Every subsequent operation on the effect is a no-op.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::event::{Event, EventBus};

use super::context::{self, RunningEffect};
use super::observer::{ObserverCore, ObserverId};
use super::scheduler::Scheduler;

/// A teardown callback run before the owning effect's next run and on
/// disposal.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Explicit teardown handle returned by a scoped effect's setup step.
///
/// A setup that owns no resources returns [`Teardown::none`]; one that
/// does returns [`Teardown::new`] with the release step.
pub struct Teardown(Option<Cleanup>);

impl Teardown {
    /// No teardown required.
    pub fn none() -> Self {
        Self(None)
    }

    /// Tear down by running `f`.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub(crate) fn into_cleanup(self) -> Option<Cleanup> {
        self.0
    }
}

/// Unique identifier for an effect.
///
/// Membership tables (observer subscriptions, the running-effect stack)
/// key on this id rather than on object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

impl EffectId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Lifecycle events published on an effect's event bus.
#[derive(Debug)]
pub enum EffectEvent<T> {
    /// An observer registered this effect as a dependent.
    Track(ObserverId),
    /// An observer dropped this effect from its membership.
    Untrack(ObserverId),
    /// Pending cleanups (the payload is their count) are about to run.
    BeforeClean(usize),
    /// The callback is about to execute.
    BeforeRun,
    /// The callback completed with this result.
    AfterRun(T),
    /// The named observer triggered this effect.
    Trigger(ObserverId),
    /// The effect was disposed.
    Dispose,
}

/// Registration keys for [`EffectEvent`] handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectEventKind {
    Track,
    Untrack,
    BeforeClean,
    BeforeRun,
    AfterRun,
    Trigger,
    Dispose,
}

impl<T> Event for EffectEvent<T> {
    type Kind = EffectEventKind;

    fn kind(&self) -> EffectEventKind {
        match self {
            EffectEvent::Track(_) => EffectEventKind::Track,
            EffectEvent::Untrack(_) => EffectEventKind::Untrack,
            EffectEvent::BeforeClean(_) => EffectEventKind::BeforeClean,
            EffectEvent::BeforeRun => EffectEventKind::BeforeRun,
            EffectEvent::AfterRun(_) => EffectEventKind::AfterRun,
            EffectEvent::Trigger(_) => EffectEventKind::Trigger,
            EffectEvent::Dispose => EffectEventKind::Dispose,
        }
    }
}

/// Handler signature for effect lifecycle hooks.
pub type EffectHook<T> = Arc<dyn Fn(&EffectEvent<T>) + Send + Sync>;

/// Configuration for a new effect.
///
/// Each `on_*` field, when present, is registered on the effect's event
/// bus before the effect can run for the first time.
pub struct EffectOptions<T> {
    /// Scheduler deciding when a submitted effect actually runs.
    /// `None` runs submissions inline.
    pub scheduler: Option<Arc<dyn Scheduler>>,
    /// Whether observers may register this effect as a dependent.
    pub should_track: bool,
    pub on_track: Option<EffectHook<T>>,
    pub on_untrack: Option<EffectHook<T>>,
    pub on_before_clean: Option<EffectHook<T>>,
    pub on_before_run: Option<EffectHook<T>>,
    pub on_after_run: Option<EffectHook<T>>,
    pub on_trigger: Option<EffectHook<T>>,
    pub on_dispose: Option<EffectHook<T>>,
}

impl<T> Default for EffectOptions<T> {
    fn default() -> Self {
        Self {
            scheduler: None,
            should_track: true,
            on_track: None,
            on_untrack: None,
            on_before_clean: None,
            on_before_run: None,
            on_after_run: None,
            on_trigger: None,
            on_dispose: None,
        }
    }
}

/// Type-erased view of an effect, used by observers, the running-effect
/// stack, and schedulers.
pub(crate) trait AnyEffect: Send + Sync {
    fn id(&self) -> EffectId;
    fn is_closed(&self) -> bool;
    /// Whether observers may currently register this effect.
    fn accepts_tracking(&self) -> bool;
    fn run_dyn(&self);
    fn submit_dyn(&self);
    /// Record that `observer` now tracks this effect.
    fn attach(&self, observer: ObserverId, link: Weak<ObserverCore>);
    /// Drop the back-reference to `observer`.
    fn detach(&self, observer: ObserverId);
    fn add_cleanup_dyn(&self, cleanup: Cleanup);
    /// Emit the `Trigger` lifecycle event for `observer`.
    fn notify_trigger(&self, observer: ObserverId);
}

pub(crate) struct EffectCore<T> {
    id: EffectId,
    callback: Box<dyn Fn() -> T + Send + Sync>,
    cleanups: Mutex<Vec<Cleanup>>,
    /// Observers currently tracking this effect, in registration order.
    /// Weak links keep the effect/observer graph acyclic.
    owners: Mutex<IndexMap<ObserverId, Weak<ObserverCore>>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    should_track: bool,
    closed: AtomicBool,
    events: EventBus<EffectEvent<T>>,
    weak_self: Weak<EffectCore<T>>,
}

impl<T: Send + Sync + 'static> EffectCore<T> {
    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn run(&self) -> Option<T> {
        if self.closed() {
            return None;
        }

        let handle: Weak<dyn AnyEffect> = self.weak_self.clone();
        let entry = RunningEffect {
            id: self.id,
            handle,
        };
        // A rejected push means this effect is already running; skip the
        // run instead of recursing into it.
        let _guard = context::enter(entry)?;
        trace!(effect = self.id.raw(), "running effect");

        let pending = {
            let cleanups = self.cleanups.lock();
            cleanups.len()
        };
        self.events.emit(&EffectEvent::BeforeClean(pending));
        self.run_cleanups();

        self.events.emit(&EffectEvent::BeforeRun);
        let result = (self.callback)();
        let event = EffectEvent::AfterRun(result);
        self.events.emit(&event);

        match event {
            EffectEvent::AfterRun(result) => Some(result),
            _ => None,
        }
    }

    fn submit(&self) {
        if self.closed() {
            return;
        }
        match &self.scheduler {
            Some(scheduler) => {
                let Some(core) = self.weak_self.upgrade() else {
                    return;
                };
                let core: Arc<dyn AnyEffect> = core;
                scheduler.next(EffectHandle { core });
            }
            None => {
                self.run();
            }
        }
    }

    fn run_cleanups(&self) {
        let pending: SmallVec<[Cleanup; 4]> = {
            let mut cleanups = self.cleanups.lock();
            cleanups.drain(..).collect()
        };
        for cleanup in pending {
            cleanup();
        }
    }

    fn add_cleanup(&self, cleanup: Cleanup) -> bool {
        if self.closed() {
            // Late registration: the effect can never run it, so run it
            // now.
            cleanup();
            return false;
        }
        self.cleanups.lock().push(cleanup);
        true
    }

    fn dispose(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(effect = self.id.raw(), "disposing effect");

        self.run_cleanups();
        self.events.emit(&EffectEvent::Dispose);

        let owners: Vec<(ObserverId, Weak<ObserverCore>)> = {
            let mut owners = self.owners.lock();
            owners.drain(..).collect()
        };
        for (_, link) in owners {
            if let Some(observer) = link.upgrade() {
                observer.forget(self.id);
            }
        }

        self.events.clear();
    }
}

impl<T: Send + Sync + 'static> AnyEffect for EffectCore<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed()
    }

    fn accepts_tracking(&self) -> bool {
        self.should_track && !self.closed()
    }

    fn run_dyn(&self) {
        self.run();
    }

    fn submit_dyn(&self) {
        self.submit();
    }

    fn attach(&self, observer: ObserverId, link: Weak<ObserverCore>) {
        if self.closed() || !self.should_track {
            return;
        }
        {
            let mut owners = self.owners.lock();
            if owners.contains_key(&observer) {
                return;
            }
            owners.insert(observer, link);
        }
        self.events.emit(&EffectEvent::Track(observer));
    }

    fn detach(&self, observer: ObserverId) {
        if self.closed() {
            return;
        }
        let removed = self.owners.lock().shift_remove(&observer).is_some();
        if removed {
            self.events.emit(&EffectEvent::Untrack(observer));
        }
    }

    fn add_cleanup_dyn(&self, cleanup: Cleanup) {
        self.add_cleanup(cleanup);
    }

    fn notify_trigger(&self, observer: ObserverId) {
        self.events.emit(&EffectEvent::Trigger(observer));
    }
}

/// A re-runnable, disposable unit of work with dependency tracking.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = create_effect({
///     let count = count.clone();
///     move || println!("count is {}", count.get())
/// });
///
/// count.set(5); // prints: "count is 5"
/// effect.dispose();
/// ```
pub struct Effect<T = ()> {
    core: Arc<EffectCore<T>>,
}

impl<T: Send + Sync + 'static> Effect<T> {
    /// Create an effect without running it. Use
    /// [`create_effect`](super::create_effect) to create and submit in
    /// one step.
    pub fn new(callback: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::with_options(callback, EffectOptions::default())
    }

    /// Create an effect with an explicit scheduler binding, tracking
    /// flag, and lifecycle hooks. The effect does not run yet.
    pub fn with_options(
        callback: impl Fn() -> T + Send + Sync + 'static,
        options: EffectOptions<T>,
    ) -> Self {
        let EffectOptions {
            scheduler,
            should_track,
            on_track,
            on_untrack,
            on_before_clean,
            on_before_run,
            on_after_run,
            on_trigger,
            on_dispose,
        } = options;

        let core = Arc::new_cyclic(|weak| EffectCore {
            id: EffectId::next(),
            callback: Box::new(callback),
            cleanups: Mutex::new(Vec::new()),
            owners: Mutex::new(IndexMap::new()),
            scheduler,
            should_track,
            closed: AtomicBool::new(false),
            events: EventBus::new(),
            weak_self: weak.clone(),
        });

        let hooks = [
            (EffectEventKind::Track, on_track),
            (EffectEventKind::Untrack, on_untrack),
            (EffectEventKind::BeforeClean, on_before_clean),
            (EffectEventKind::BeforeRun, on_before_run),
            (EffectEventKind::AfterRun, on_after_run),
            (EffectEventKind::Trigger, on_trigger),
            (EffectEventKind::Dispose, on_dispose),
        ];
        for (kind, hook) in hooks {
            if let Some(hook) = hook {
                core.events.on(kind, move |event| hook(event));
            }
        }

        Self { core }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.core.id
    }

    /// Whether the effect has been disposed.
    pub fn is_closed(&self) -> bool {
        self.core.closed()
    }

    /// Whether observers may register this effect as a dependent.
    pub fn should_track(&self) -> bool {
        self.core.should_track
    }

    /// The effect's lifecycle event bus.
    pub fn events(&self) -> &EventBus<EffectEvent<T>> {
        &self.core.events
    }

    /// Run pending cleanups, then the callback, attributing its signal
    /// reads to this effect.
    ///
    /// Returns `None` without executing when the effect is disposed or
    /// already running (a literal re-entrant run).
    pub fn run(&self) -> Option<T> {
        self.core.run()
    }

    /// Submit the effect for execution: hand it to the bound scheduler,
    /// or run it inline when no scheduler is bound. No-op when disposed.
    ///
    /// This is the single entry point used both by observer triggers and
    /// by explicit creation.
    pub fn submit(&self) {
        self.core.submit()
    }

    /// Register a cleanup to run before the next run and on disposal.
    ///
    /// When the effect is already disposed the cleanup is invoked
    /// immediately and `false` is returned.
    pub fn add(&self, cleanup: impl FnOnce() + Send + 'static) -> bool {
        self.core.add_cleanup(Box::new(cleanup))
    }

    /// Dispose the effect: run pending cleanups, notify observers to
    /// forget it, clear its event bus. Terminal and idempotent.
    pub fn dispose(&self) {
        self.core.dispose()
    }

    /// Number of observers currently tracking this effect.
    pub fn owner_count(&self) -> usize {
        self.core.owners.lock().len()
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + Sync + 'static> Debug for Effect<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.core.id)
            .field("closed", &self.is_closed())
            .field("owner_count", &self.owner_count())
            .finish()
    }
}

/// Type-erased handle handed to [`Scheduler`] implementations.
///
/// Handles compare equal when they refer to the same effect, so
/// schedulers can keep uniqueness-enforcing buffers of them.
#[derive(Clone)]
pub struct EffectHandle {
    core: Arc<dyn AnyEffect>,
}

impl EffectHandle {
    /// The effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.core.id()
    }

    /// Whether the effect has been disposed.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Run the effect now.
    pub fn run(&self) {
        self.core.run_dyn()
    }
}

impl PartialEq for EffectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.core.id() == other.core.id()
    }
}

impl Eq for EffectHandle {}

impl Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("id", &self.core.id())
            .finish()
    }
}
