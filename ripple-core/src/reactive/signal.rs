//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a mutable value cell
//! that tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running (and tracking is
//!    enabled), the signal's observer registers that effect.
//!
//! 2. When a signal's value changes, the previous and next values are
//!    compared with the configured equality; only an unequal write
//!    triggers the observer.
//!
//! 3. Triggering submits every registered effect to its scheduler, in
//!    registration order.
//!
//! The stored value only changes through an explicit write; a write that
//! is equal under the predicate never reaches dependents.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::observer::Observer;

/// Equality policy deciding whether a write propagates to dependents.
///
/// The predicate receives `(previous, next)`; a `true` result suppresses
/// the trigger.
pub enum Equality<T> {
    /// Every write is reported equal; dependents never trigger.
    AlwaysEqual,
    /// Every write is reported unequal; dependents always trigger.
    NeverEqual,
    /// Custom predicate over `(previous, next)`.
    Predicate(Arc<dyn Fn(&T, &T) -> bool + Send + Sync>),
}

impl<T> Equality<T> {
    /// Equality from a custom predicate.
    pub fn predicate(f: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    pub(crate) fn are_equal(&self, previous: &T, next: &T) -> bool {
        match self {
            Equality::AlwaysEqual => true,
            Equality::NeverEqual => false,
            Equality::Predicate(f) => f(previous, next),
        }
    }
}

impl<T: PartialEq> Equality<T> {
    /// Structural equality via `PartialEq`. The default.
    pub fn structural() -> Self {
        Self::predicate(|previous, next| previous == next)
    }
}

impl<T> Clone for Equality<T> {
    fn clone(&self) -> Self {
        match self {
            Equality::AlwaysEqual => Equality::AlwaysEqual,
            Equality::NeverEqual => Equality::NeverEqual,
            Equality::Predicate(f) => Equality::Predicate(Arc::clone(f)),
        }
    }
}

impl<T> Debug for Equality<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Equality::AlwaysEqual => f.write_str("AlwaysEqual"),
            Equality::NeverEqual => f.write_str("NeverEqual"),
            Equality::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

struct SignalInner<T> {
    value: RwLock<T>,
    equality: Equality<T>,
    observer: Observer,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        // The cell is going away; unregister from every dependent.
        self.observer.dispose();
    }
}

/// A reactive signal holding a value of type `T`.
///
/// Cloning a signal shares its state: all clones read and write the same
/// cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value (tracked when read inside an effect)
/// let value = count.get();
///
/// // Update the value (triggers dependents when it changed)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a signal with the given initial value and structural
    /// equality.
    pub fn new(value: T) -> Self {
        Self::with_equality(value, Equality::structural())
    }

    /// Create a signal from a producer, evaluated eagerly.
    pub fn from_fn(producer: impl FnOnce() -> T) -> Self {
        Self::new(producer())
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a signal with an explicit equality policy.
    pub fn with_equality(value: T, equality: Equality<T>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                value: RwLock::new(value),
                equality,
                observer: Observer::new(),
            }),
        }
    }

    /// Get the current value.
    ///
    /// Read inside a running effect (with tracking enabled), this also
    /// registers the effect as a dependent.
    pub fn get(&self) -> T {
        self.inner.observer.track();
        self.inner.value.read().clone()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Store a new value; trigger dependents when it is unequal to the
    /// previous value under the configured equality.
    pub fn set(&self, value: T) {
        let changed = {
            let mut guard = self.inner.value.write();
            let previous = std::mem::replace(&mut *guard, value);
            !self.inner.equality.are_equal(&previous, &guard)
        };
        if changed {
            self.inner.observer.trigger();
        }
    }

    /// Update the value with a function of the previous value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.get_untracked();
        self.set(f(&current));
    }

    /// Number of effects currently depending on this signal.
    pub fn subscriber_count(&self) -> usize {
        self.inner.observer.len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_effect, untrack};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_from_fn_evaluates_eagerly() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let signal = Signal::from_fn(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            7
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.get(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn equal_write_does_not_trigger() {
        let signal = Signal::new(1);
        let captured = Arc::new(AtomicI32::new(0));
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let captured_clone = captured.clone();
        let runs_clone = runs.clone();
        let _effect = create_effect(move || {
            captured_clone.store(signal_clone.get(), Ordering::SeqCst);
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(captured.load(Ordering::SeqCst), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(1);
        assert_eq!(captured.load(Ordering::SeqCst), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(2);
        assert_eq!(captured.load(Ordering::SeqCst), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unequal_write_reruns_synchronously() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = create_effect(move || {
            signal_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        // No scheduler bound: the re-run completed before `set` returned.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = create_effect(move || {
            untrack(|| signal_clone.get());
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(signal.subscriber_count(), 0);

        signal.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_untracked_does_not_subscribe() {
        let signal = Signal::new(3);

        let signal_clone = signal.clone();
        let _effect = create_effect(move || {
            signal_clone.get_untracked();
        });

        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn never_equal_policy_always_triggers() {
        let signal = Signal::with_equality(1, Equality::NeverEqual);
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = create_effect(move || {
            signal_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn always_equal_policy_never_triggers() {
        let signal = Signal::with_equality(1, Equality::AlwaysEqual);
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = create_effect(move || {
            signal_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(99);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        // The value still changed; only propagation was suppressed.
        assert_eq!(signal.get_untracked(), 99);
    }

    #[test]
    fn predicate_receives_previous_then_next() {
        let seen = Arc::new(parking_lot::Mutex::new((0, 0)));

        let seen_clone = seen.clone();
        let signal = Signal::with_equality(
            10,
            Equality::predicate(move |previous: &i32, next: &i32| {
                *seen_clone.lock() = (*previous, *next);
                previous == next
            }),
        );

        signal.set(20);
        assert_eq!(*seen.lock(), (10, 20));
    }

    #[test]
    fn signal_clone_shares_state() {
        let a = Signal::new(0);
        let b = a.clone();

        a.set(42);
        assert_eq!(b.get(), 42);

        b.set(100);
        assert_eq!(a.get(), 100);
    }
}
