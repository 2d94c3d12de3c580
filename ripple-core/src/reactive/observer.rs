//! Observer Implementation
//!
//! An Observer is the subscription set of one signal or computed value:
//! the effects that read it during their most recent runs. Membership is
//! keyed by [`EffectId`] and holds weak handles, so the effect/observer
//! graph stays acyclic and disposal on either side is deterministic.
//!
//! Membership order is registration order, and trigger fan-out follows
//! it. An effect appears at most once per observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context;
use super::effect::{AnyEffect, EffectId};

/// Unique identifier for an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Shared observer state. Effects hold weak links to this so disposal
/// can unregister everywhere without keeping the observer alive.
pub(crate) struct ObserverCore {
    id: ObserverId,
    effects: Mutex<IndexMap<EffectId, Weak<dyn AnyEffect>>>,
}

impl ObserverCore {
    /// Drop membership without calling back into the effect. Used by
    /// effect disposal, which already knows it is closed.
    pub(crate) fn forget(&self, effect: EffectId) {
        self.effects.lock().shift_remove(&effect);
    }

    fn remove(&self, effect: EffectId) -> bool {
        let entry = self.effects.lock().shift_remove(&effect);
        match entry {
            Some(handle) => {
                if let Some(effect_ref) = handle.upgrade() {
                    effect_ref.detach(self.id);
                }
                true
            }
            None => false,
        }
    }

    fn trigger(&self) {
        // Snapshot under the lock, submit outside it: running an effect
        // may re-enter this observer (a re-read of the signal) or any
        // other.
        let snapshot: SmallVec<[(EffectId, Weak<dyn AnyEffect>); 8]> = self
            .effects
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        let mut dead: SmallVec<[EffectId; 4]> = SmallVec::new();
        for (id, handle) in snapshot {
            match handle.upgrade() {
                Some(effect) => {
                    effect.submit_dyn();
                    effect.notify_trigger(self.id);
                }
                None => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut effects = self.effects.lock();
            for id in dead {
                effects.shift_remove(&id);
            }
        }
    }

    fn dispose(&self) {
        let drained: Vec<(EffectId, Weak<dyn AnyEffect>)> = {
            let mut effects = self.effects.lock();
            effects.drain(..).collect()
        };
        for (_, handle) in drained {
            if let Some(effect) = handle.upgrade() {
                effect.detach(self.id);
            }
        }
    }
}

/// The subscription set of effects depending on one signal or computed
/// value.
pub struct Observer {
    core: Arc<ObserverCore>,
}

impl Observer {
    /// Create an observer with no members.
    pub fn new() -> Self {
        Self {
            core: Arc::new(ObserverCore {
                id: ObserverId::next(),
                effects: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the observer's unique ID.
    pub fn id(&self) -> ObserverId {
        self.core.id
    }

    /// Attribute the current read to the running effect: when tracking
    /// is enabled and an effect is running, register it as a member.
    /// No-op otherwise.
    pub fn track(&self) {
        if !context::is_tracking() {
            return;
        }
        let Some(current) = context::current_effect() else {
            return;
        };

        let Some(effect) = current.handle.upgrade() else {
            return;
        };
        if !effect.accepts_tracking() {
            return;
        }
        {
            let mut effects = self.core.effects.lock();
            if effects.contains_key(&current.id) {
                return;
            }
            effects.insert(current.id, current.handle.clone());
        }
        trace!(
            observer = self.core.id.raw(),
            effect = current.id.raw(),
            "tracked effect"
        );
        effect.attach(self.core.id, Arc::downgrade(&self.core));
    }

    /// Submit every member to its scheduler, in registration order, and
    /// emit each member's `Trigger` event. Dead members are pruned.
    pub fn trigger(&self) {
        self.core.trigger()
    }

    /// Drop one member, emitting its `Untrack` event. Returns whether it
    /// was present.
    pub fn remove(&self, effect: EffectId) -> bool {
        self.core.remove(effect)
    }

    /// Unregister this observer from every member, then clear
    /// membership. Idempotent.
    pub fn dispose(&self) {
        self.core.dispose()
    }

    /// Number of effects currently registered.
    pub fn len(&self) -> usize {
        self.core.effects.lock().len()
    }

    /// Whether no effect is registered.
    pub fn is_empty(&self) -> bool {
        self.core.effects.lock().is_empty()
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.core.id)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::Effect;
    use crate::reactive::untrack;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn track_outside_any_effect_registers_nothing() {
        let observer = Observer::new();
        observer.track();
        assert!(observer.is_empty());
    }

    #[test]
    fn track_registers_the_running_effect_once() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::new(move || {
            // Read twice; membership stays single.
            observer_clone.track();
            observer_clone.track();
        });

        effect.run();
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn untracked_reads_register_nothing() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::new(move || {
            untrack(|| observer_clone.track());
        });

        effect.run();
        assert!(observer.is_empty());
    }

    #[test]
    fn trigger_submits_members() {
        let observer = Arc::new(Observer::new());
        let runs = Arc::new(AtomicI32::new(0));

        let observer_clone = observer.clone();
        let runs_clone = runs.clone();
        let effect = Effect::new(move || {
            observer_clone.track();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        effect.run();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        observer.trigger();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_detaches_the_effect() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::new(move || observer_clone.track());
        effect.run();
        assert_eq!(observer.len(), 1);
        assert_eq!(effect.owner_count(), 1);

        assert!(observer.remove(effect.id()));
        assert!(observer.is_empty());
        assert_eq!(effect.owner_count(), 0);

        assert!(!observer.remove(effect.id()));
    }

    #[test]
    fn dispose_clears_membership_and_back_references() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::new(move || observer_clone.track());
        effect.run();

        observer.dispose();
        assert!(observer.is_empty());
        assert_eq!(effect.owner_count(), 0);

        // Idempotent.
        observer.dispose();
    }

    #[test]
    fn effect_with_tracking_disabled_is_not_registered() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::with_options(
            move || observer_clone.track(),
            crate::reactive::EffectOptions {
                should_track: false,
                ..Default::default()
            },
        );

        effect.run();
        assert!(observer.is_empty());
    }

    #[test]
    fn trigger_prunes_dropped_effects() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::new(move || observer_clone.track());
        effect.run();
        assert_eq!(observer.len(), 1);

        // Dropped without dispose: the membership entry goes dead and is
        // pruned on the next trigger.
        drop(effect);
        observer.trigger();
        assert!(observer.is_empty());
    }

    #[test]
    fn disposing_the_effect_removes_it_from_the_observer() {
        let observer = Arc::new(Observer::new());

        let observer_clone = observer.clone();
        let effect = Effect::new(move || observer_clone.track());
        effect.run();
        assert_eq!(observer.len(), 1);

        effect.dispose();
        assert!(observer.is_empty());
    }
}
