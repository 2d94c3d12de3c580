//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a signal is read, the
//! signal registers the current effect as a dependent.
//!
//! # Implementation
//!
//! Each thread owns a stack of running effects. When an effect starts a
//! run it pushes itself; when the run completes the entry is popped. The
//! stack enforces element uniqueness, so a literal re-entrant run of the
//! effect already at the top (or anywhere below) is rejected before the
//! callback executes. Nested runs (an effect whose callback forces a
//! computed value, which runs its own internal effect) stack naturally.
//!
//! Alongside the stack lives the tracking flag. While it is cleared,
//! signal reads are not attributed to any effect; [`with_tracking`] and
//! [`untrack`] scope the flag and restore the previous value on every
//! exit path, including panics.
//!
//! Keeping this state thread-local rather than process-global lets
//! independent reactive graphs coexist and lets tests run in isolation.

use std::cell::{Cell, RefCell};
use std::sync::Weak;

use crate::collections::Stack;

use super::effect::{AnyEffect, EffectId};

thread_local! {
    static RUNNING: RefCell<Stack<RunningEffect>> = RefCell::new(Stack::new().unique());
    static TRACKING: Cell<bool> = Cell::new(true);
}

/// An entry on the running-effect stack: the effect's id plus a weak
/// handle observers use to register it.
#[derive(Clone)]
pub(crate) struct RunningEffect {
    pub(crate) id: EffectId,
    pub(crate) handle: Weak<dyn AnyEffect>,
}

impl PartialEq for RunningEffect {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Guard that pops the running-effect stack when dropped.
///
/// Popping on drop keeps the stack paired with its push even if the
/// effect's callback panics.
pub(crate) struct RunGuard {
    id: EffectId,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUNNING.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id, self.id,
                    "running-effect stack mismatch: pushed {:?}, popped {:?}",
                    self.id, entry.id
                );
            }
        });
    }
}

/// Push an effect onto the running stack. Returns `None` when the effect
/// is already running (the uniqueness constraint rejected the push), in
/// which case the caller must skip the run entirely.
pub(crate) fn enter(entry: RunningEffect) -> Option<RunGuard> {
    let id = entry.id;
    let pushed = RUNNING.with(|stack| stack.borrow_mut().push(entry).is_ok());
    pushed.then_some(RunGuard { id })
}

/// The innermost currently running effect, if any.
pub(crate) fn current_effect() -> Option<RunningEffect> {
    RUNNING.with(|stack| stack.borrow().top().cloned())
}

/// Whether signal reads are currently attributed to the running effect.
pub fn is_tracking() -> bool {
    TRACKING.with(|flag| flag.get())
}

/// Run `f` with dependency tracking forced to `enabled`, restoring the
/// previous setting afterwards, on the normal path and on unwind.
pub fn with_tracking<R>(enabled: bool, f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            TRACKING.with(|flag| flag.set(self.0));
        }
    }

    let previous = TRACKING.with(|flag| flag.replace(enabled));
    let _restore = Restore(previous);
    f()
}

/// Run `f` without attributing its signal reads to any effect.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    with_tracking(false, f)
}

/// Register a cleanup with the innermost currently running effect.
///
/// Returns `false` (and drops the cleanup unrun) when no effect is
/// running.
pub fn on_cleanup(cleanup: impl FnOnce() + Send + 'static) -> bool {
    let Some(current) = current_effect() else {
        return false;
    };
    let Some(effect) = current.handle.upgrade() else {
        return false;
    };
    effect.add_cleanup_dyn(Box::new(cleanup));
    true
}
