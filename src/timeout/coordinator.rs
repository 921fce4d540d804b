// src/timeout/coordinator.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use super::{TimeoutKind, TimeoutOwner};
use crate::errors::{EngineError, Result};
use crate::window::WindowKey;

/// Handle for one registered timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerHandle {
    id: u64,
    key: WindowKey,
}

impl TimerHandle {
    pub fn key(&self) -> &WindowKey {
        &self.key
    }
}

struct Registration {
    id: u64,
    kind: TimeoutKind,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    runtime: Handle,
    next_id: AtomicU64,
    timers: Mutex<HashMap<WindowKey, Registration>>,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, HashMap<WindowKey, Registration>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the registration for `key` if it is still the timer `id`.
    ///
    /// Whoever removes the entry (expiry or cancel) wins; the loser sees
    /// nothing to remove and does nothing.
    fn claim(&self, key: &WindowKey, id: u64) -> Option<Registration> {
        let mut timers = self.timers();
        match timers.get(key) {
            Some(reg) if reg.id == id => timers.remove(key),
            _ => None,
        }
    }
}

/// Registers, cancels and fires one-shot window timers.
///
/// Timers run as Tokio tasks on the runtime captured at construction, so
/// `register` may be called from any thread. The owner's `on_timeout` runs
/// on the blocking pool.
#[derive(Clone)]
pub struct TimeoutCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for TimeoutCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutCoordinator")
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

impl TimeoutCoordinator {
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                next_id: AtomicU64::new(1),
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Build a coordinator on the runtime of the calling thread.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| EngineError::NoRuntime)
    }

    /// Arm a timer for `key`.
    ///
    /// Registering a second timer for a key that already has one is a
    /// caller error; check [`registered`](Self::registered) first.
    pub fn register(
        &self,
        owner: Arc<dyn TimeoutOwner>,
        delay: Duration,
        key: WindowKey,
        kind: TimeoutKind,
    ) -> Result<TimerHandle> {
        let mut timers = self.inner.timers();
        if timers.contains_key(&key) {
            return Err(EngineError::TimerAlreadyRegistered(key.to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TimerHandle {
            id,
            key: key.clone(),
        };

        // The task cannot claim the entry before it is inserted: it needs the
        // lock we are holding.
        let task = self.inner.runtime.spawn(expire(
            Arc::downgrade(&self.inner),
            owner,
            delay,
            key.clone(),
            id,
        ));

        debug!(window = %key, %kind, delay_ms = delay.as_millis() as u64, "timer registered");
        timers.insert(
            key,
            Registration {
                id,
                kind,
                task: Some(task),
            },
        );

        Ok(handle)
    }

    /// Cancel a timer. Returns `false` if it already fired (or is firing) or
    /// was cancelled before; that is not an error.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        match self.inner.claim(&handle.key, handle.id) {
            Some(mut reg) => {
                if let Some(task) = reg.task.take() {
                    task.abort();
                }
                debug!(window = %handle.key, kind = %reg.kind, "timer cancelled");
                true
            }
            None => {
                trace!(window = %handle.key, "cancel after expiry; no-op");
                false
            }
        }
    }

    /// The outstanding timer for `key`, if any.
    pub fn registered(&self, key: &WindowKey) -> Option<TimerHandle> {
        self.inner.timers().get(key).map(|reg| TimerHandle {
            id: reg.id,
            key: key.clone(),
        })
    }

    pub fn outstanding(&self) -> usize {
        self.inner.timers().len()
    }
}

async fn expire(
    inner: Weak<Inner>,
    owner: Arc<dyn TimeoutOwner>,
    delay: Duration,
    key: WindowKey,
    id: u64,
) {
    tokio::time::sleep(delay).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let Some(reg) = inner.claim(&key, id) else {
        trace!(window = %key, "timer expired after cancellation; skipping");
        return;
    };
    drop(inner);

    let kind = reg.kind;
    debug!(window = %key, %kind, "timer expired");
    let window = key.to_string();
    if let Err(err) = tokio::task::spawn_blocking(move || owner.on_timeout(kind, key)).await {
        error!(%window, error = %err, "timeout handler panicked");
    }
}
