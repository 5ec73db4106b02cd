//! Delayed-action scheduling used by timeout supervisors and simulated providers.
//!
//! | Scheduler | Clock | Use |
//! |-----------|-------|-----|
//! | [`TokioScheduler`] | tokio timer | Production; respects `tokio::time::pause` |
//! | [`ManualScheduler`] | virtual, advanced by hand | Deterministic tests and simulations |

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// One-shot action run when a scheduled delay elapses.
pub type ScheduledAction = Box<dyn FnOnce() + Send + 'static>;

/// Source of one-shot delayed actions.
pub trait Scheduler: Send + Sync {
    /// Runs `action` once after `delay`, unless the returned task is cancelled first.
    fn schedule(&self, delay: Duration, action: ScheduledAction) -> ScheduledTask;
}

/// Handle to a scheduled action. Dropping it does not cancel the action.
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl ScheduledTask {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    /// Prevents the action from running. Safe to call repeatedly or after it ran.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Captures the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, action: ScheduledAction) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                action();
            }
        });
        ScheduledTask::new(cancelled, Some(join.abort_handle()))
    }
}

struct ManualEntry {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    action: ScheduledAction,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_seq: u64,
    entries: Vec<ManualEntry>,
}

/// Virtual-clock scheduler. Nothing fires until [`advance`](Self::advance) is called.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of scheduled actions that are neither cancelled nor fired.
    pub fn pending(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| !entry.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Moves the clock forward, running every due action in deadline order.
    ///
    /// Actions run without the scheduler lock held, so they may schedule
    /// further actions; those fire in the same call if they fall due within it.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        loop {
            let next = {
                let mut inner = self.lock();
                inner
                    .entries
                    .retain(|entry| !entry.cancelled.load(Ordering::SeqCst));
                let position = inner
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due <= target)
                    .min_by_key(|(_, entry)| (entry.due, entry.seq))
                    .map(|(index, _)| index);
                match position {
                    Some(index) => {
                        let entry = inner.entries.swap_remove(index);
                        inner.now = inner.now.max(entry.due);
                        Some(entry)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };

            let Some(entry) = next else {
                return;
            };
            if !entry.cancelled.swap(true, Ordering::SeqCst) {
                (entry.action)();
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, action: ScheduledAction) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let due = inner.now + delay;
        inner.entries.push(ManualEntry {
            due,
            seq,
            cancelled: Arc::clone(&cancelled),
            action,
        });
        ScheduledTask::new(cancelled, None)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
