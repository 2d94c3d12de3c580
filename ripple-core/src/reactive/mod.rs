//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed
//! values, effects, observers, and schedulers. These primitives form a
//! fine-grained dependency-tracking engine.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is
//! read within a running effect, the signal automatically registers that
//! effect as a dependent. When the signal's value changes under its
//! configured equality, all dependents are notified.
//!
//! ## Computed values
//!
//! A Computed is a derived value that caches its result. It recomputes
//! only when one of its dependencies changes, and re-publishes to its
//! own dependents only when the recomputed value actually differs.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever its
//! dependencies change. Effects carry cleanup lists, lifecycle hooks,
//! and an optional scheduler deciding when a triggered run happens.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local stack of running effects to detect
//! dependencies: when a signal is read, the effect on top of the stack
//! (if any, and if tracking is enabled) is registered with the signal's
//! observer. This approach ("automatic dependency tracking") is used by
//! SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod observer;
mod scheduler;
mod signal;

pub use computed::Computed;
pub use context::{is_tracking, on_cleanup, untrack, with_tracking};
pub use effect::{
    Cleanup, Effect, EffectEvent, EffectEventKind, EffectHandle, EffectHook, EffectId,
    EffectOptions, Teardown,
};
pub use observer::{Observer, ObserverId};
pub use scheduler::{
    QueueScheduler, RegistryError, Scheduler, SchedulerKind, SchedulerRegistry, SyncScheduler,
};
pub use signal::{Equality, Signal};

/// Create a signal with structural equality.
///
/// # Example
///
/// ```ignore
/// let count = create_signal(0);
/// assert_eq!(count.get(), 0);
/// count.set(42);
/// assert_eq!(count.get(), 42);
/// ```
pub fn create_signal<T>(value: T) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Signal::new(value)
}

/// Create a computed value with structural equality. The getter runs
/// lazily, on first access.
///
/// # Example
///
/// ```ignore
/// let count = create_signal(5);
/// let doubled = create_computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_computed<T>(getter: impl Fn() -> T + Send + Sync + 'static) -> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Computed::new(getter)
}

/// Create an effect and submit it immediately: with no scheduler bound
/// it has run once before this returns.
pub fn create_effect<T>(callback: impl Fn() -> T + Send + Sync + 'static) -> Effect<T>
where
    T: Send + Sync + 'static,
{
    create_effect_with(callback, EffectOptions::default())
}

/// Create an effect with explicit options and submit it immediately.
pub fn create_effect_with<T>(
    callback: impl Fn() -> T + Send + Sync + 'static,
    options: EffectOptions<T>,
) -> Effect<T>
where
    T: Send + Sync + 'static,
{
    let effect = Effect::with_options(callback, options);
    effect.submit();
    effect
}

/// Create an effect from a setup step returning an explicit teardown,
/// and submit it immediately. The teardown runs before every re-run and
/// once more on disposal.
///
/// # Example
///
/// ```ignore
/// let source = create_signal("a.log");
/// let effect = create_scoped_effect({
///     let source = source.clone();
///     move || {
///         let file = open(source.get());
///         Teardown::new(move || close(file))
///     }
/// });
/// ```
pub fn create_scoped_effect(
    setup: impl Fn() -> Teardown + Send + Sync + 'static,
) -> Effect<()> {
    create_effect(move || {
        if let Some(cleanup) = setup().into_cleanup() {
            // The innermost running effect is this one.
            on_cleanup(cleanup);
        }
    })
}
