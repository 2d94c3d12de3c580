//! Scheduler Implementation
//!
//! A scheduler decides when a submitted effect actually runs. Effects
//! without a scheduler run inline on submission; effects bound to a
//! scheduler hand themselves over and let the policy decide.
//!
//! Two policies ship with the engine:
//!
//! - [`SyncScheduler`]: run every submission immediately.
//! - [`QueueScheduler`]: run the first submission immediately and buffer
//!   submissions arriving while that flush is in progress, draining them
//!   FIFO before the flush completes. Re-entrant triggers (a signal
//!   write from inside an effect's own flush) therefore join the current
//!   flush instead of recursing.
//!
//! A process-wide [`SchedulerRegistry`] maps each [`SchedulerKind`] to
//! at most one instance; `sync` and `queue` instances are pre-registered
//! at first access. Effects bind schedulers by explicit handle, so the
//! registry is a directory, not a required lookup path.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::collections::Queue;

use super::effect::EffectHandle;

/// The kind of a scheduler, used as its registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerKind {
    /// Runs submissions immediately.
    Sync,
    /// Buffers submissions made during an active flush.
    Queue,
    /// A caller-provided policy.
    Custom(&'static str),
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Sync => f.write_str("sync"),
            SchedulerKind::Queue => f.write_str("queue"),
            SchedulerKind::Custom(name) => f.write_str(name),
        }
    }
}

/// Policy object controlling when a triggered effect executes.
pub trait Scheduler: Send + Sync {
    /// The kind this scheduler registers under.
    fn kind(&self) -> SchedulerKind;

    /// Accept a submitted effect and decide when it runs.
    fn next(&self, effect: EffectHandle);
}

/// Runs every submission immediately.
pub struct SyncScheduler;

impl SyncScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for SyncScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Sync
    }

    fn next(&self, effect: EffectHandle) {
        effect.run();
    }
}

/// Runs the first submission immediately and drains submissions that
/// arrive during the flush, FIFO, before returning.
///
/// The buffer enforces uniqueness, so an effect re-triggered repeatedly
/// within one flush runs once more at most.
pub struct QueueScheduler {
    flushing: AtomicBool,
    buffer: Mutex<Queue<EffectHandle>>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self {
            flushing: AtomicBool::new(false),
            buffer: Mutex::new(Queue::new().unique()),
        }
    }

    /// Number of effects waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl Default for QueueScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the flushing flag on every exit path, including unwinds from
/// a panicking effect.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler for QueueScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Queue
    }

    fn next(&self, effect: EffectHandle) {
        if self.flushing.swap(true, Ordering::SeqCst) {
            // A flush is already in progress on this call stack; defer
            // into it. Duplicates are dropped by the buffer.
            let deferred = self.buffer.lock().enqueue(effect).is_ok();
            if deferred {
                trace!("deferred effect into active flush");
            }
            return;
        }

        let _guard = FlushGuard(&self.flushing);
        effect.run();
        loop {
            let next = self.buffer.lock().dequeue();
            match next {
                Some(effect) => effect.run(),
                None => break,
            }
        }
    }
}

/// Failure modes of the process-wide scheduler registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A scheduler of this kind is already registered; the prior
    /// registration is left intact.
    #[error("scheduler kind `{0}` is already registered")]
    AlreadyRegistered(SchedulerKind),

    /// No scheduler of this kind is registered.
    #[error("scheduler kind `{0}` is not registered")]
    NotRegistered(SchedulerKind),
}

/// Process-wide directory mapping each scheduler kind to one instance.
pub struct SchedulerRegistry {
    schedulers: Mutex<HashMap<SchedulerKind, Arc<dyn Scheduler>>>,
}

static REGISTRY: OnceLock<SchedulerRegistry> = OnceLock::new();

impl SchedulerRegistry {
    /// The process-wide registry, with `sync` and `queue` instances
    /// pre-registered on first access.
    pub fn global() -> &'static SchedulerRegistry {
        REGISTRY.get_or_init(|| {
            let mut schedulers: HashMap<SchedulerKind, Arc<dyn Scheduler>> = HashMap::new();
            let sync: Arc<dyn Scheduler> = Arc::new(SyncScheduler::new());
            schedulers.insert(sync.kind(), sync);
            let queue: Arc<dyn Scheduler> = Arc::new(QueueScheduler::new());
            schedulers.insert(queue.kind(), queue);
            SchedulerRegistry {
                schedulers: Mutex::new(schedulers),
            }
        })
    }

    /// Register a scheduler under its kind. A kind already registered is
    /// rejected, leaving the prior registration intact.
    pub fn register(&self, scheduler: Arc<dyn Scheduler>) -> Result<(), RegistryError> {
        let kind = scheduler.kind();
        let mut schedulers = self.schedulers.lock();
        if schedulers.contains_key(&kind) {
            warn!(%kind, "rejected duplicate scheduler registration");
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        schedulers.insert(kind, scheduler);
        debug!(%kind, "registered scheduler");
        Ok(())
    }

    /// Remove the scheduler registered under `kind`.
    pub fn unregister(&self, kind: SchedulerKind) -> Result<(), RegistryError> {
        match self.schedulers.lock().remove(&kind) {
            Some(_) => {
                debug!(%kind, "unregistered scheduler");
                Ok(())
            }
            None => Err(RegistryError::NotRegistered(kind)),
        }
    }

    /// Look up the scheduler registered under `kind`.
    pub fn get(&self, kind: SchedulerKind) -> Option<Arc<dyn Scheduler>> {
        self.schedulers.lock().get(&kind).cloned()
    }
}
