//! Computed Implementation
//!
//! A Computed is a memoized derived value: a getter wrapped in an
//! internal effect, a cached value, and an observer of its own for
//! downstream dependents.
//!
//! # How Computeds Work
//!
//! 1. The first `get()` forces one run of the internal effect, which
//!    tracks the getter's dependencies and populates the cache. The
//!    version counter moves from 0 ("never computed") to 1.
//!
//! 2. Later `get()` calls return the cache without running the getter.
//!    Recomputation is driven only by the internal effect's trigger
//!    path, never by `get()`.
//!
//! 3. When a dependency changes, the internal effect's `Trigger` hook
//!    re-invokes the getter, compares old and new values with the
//!    configured equality, and only on inequality publishes the value,
//!    triggers downstream dependents, and bumps the version.
//!
//! Step 3 makes computed values transparent to downstream trackers:
//! re-reading an unchanged computed value never re-runs dependents;
//! propagation is equality-gated, not merely dirty-flagged. Getters are
//! required to be pure; the trigger path may invoke a getter more than
//! once for a single upstream change.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::effect::{Effect, EffectOptions};
use super::observer::Observer;
use super::signal::Equality;

struct ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    observer: Observer,
    effect: Effect<T>,
    value: RwLock<Option<T>>,
    /// 0 = never computed; bumped on every published (unequal) value.
    version: AtomicU64,
    equality: Equality<T>,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Recompute after an upstream trigger. Publishes only a value that
    /// is unequal to the cached one.
    fn refresh(&self) {
        let Some(next) = self.effect.run() else {
            return;
        };
        let changed = {
            let mut guard = self.value.write();
            let changed = guard
                .as_ref()
                .map_or(true, |previous| !self.equality.are_equal(previous, &next));
            *guard = Some(next);
            changed
        };
        if changed {
            self.observer.trigger();
            self.version.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<T> Drop for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.effect.dispose();
        self.observer.dispose();
    }
}

/// A cached derived value that recomputes only when a dependency
/// changes, and re-publishes only when the recomputed value differs.
///
/// Cloning a computed shares its state.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(2);
///
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(3);
/// assert_eq!(doubled.get(), 6);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed with structural equality.
    pub fn new(getter: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::with_equality(getter, Equality::structural())
    }
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed with an explicit equality policy.
    ///
    /// The getter is not run until the first `get()`.
    pub fn with_equality(
        getter: impl Fn() -> T + Send + Sync + 'static,
        equality: Equality<T>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let link = weak.clone();
            let effect = Effect::with_options(
                getter,
                EffectOptions {
                    on_trigger: Some(Arc::new(move |_event| {
                        if let Some(inner) = link.upgrade() {
                            inner.refresh();
                        }
                    })),
                    ..EffectOptions::default()
                },
            );
            ComputedInner {
                observer: Observer::new(),
                effect,
                value: RwLock::new(None),
                version: AtomicU64::new(0),
                equality,
            }
        });
        Self { inner }
    }

    /// Get the current value, computing it on first access.
    ///
    /// Read inside a running effect (with tracking enabled), this also
    /// registers the effect as a dependent of the computed value.
    pub fn get(&self) -> T {
        self.inner.observer.track();
        if self.inner.version.load(Ordering::Relaxed) == 0 {
            if let Some(value) = self.inner.effect.run() {
                *self.inner.value.write() = Some(value);
                self.inner.version.store(1, Ordering::Relaxed);
            }
        }
        self.inner
            .value
            .read()
            .clone()
            .expect("computed cache should be populated after the first run")
    }

    /// The cached value, if any, without tracking or computing.
    pub fn get_untracked(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    /// Monotonic publication counter; 0 means never computed.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Relaxed)
    }

    /// Number of effects currently depending on this computed value.
    pub fn subscriber_count(&self) -> usize {
        self.inner.observer.len()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.get_untracked())
            .field("version", &self.version())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
