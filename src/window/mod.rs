// src/window/mod.rs

//! Per-window state shared by concurrent arrivals and timeouts.
//!
//! A window is identified by a [`WindowKey`] value: rule id, nominal time
//! and, for per-radar rules, the source. The same key is used by the
//! trigger ledger and the timeout coordinator.
//!
//! [`WindowTable`] hands out one `Arc<Mutex<WindowState>>` per key, so all
//! callers touching a window serialize on that window's lock while other
//! windows proceed in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::criteria::{ElevationCandidates, VolumeScans};
use crate::nominal::NominalTime;
use crate::rule::RuleId;
use crate::timeout::TimerHandle;

/// Identity of one product window. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub rule_id: RuleId,
    pub nominal: NominalTime,
    #[serde(default)]
    pub source: Option<String>,
}

impl WindowKey {
    pub fn area(rule_id: impl Into<RuleId>, nominal: NominalTime) -> Self {
        Self {
            rule_id: rule_id.into(),
            nominal,
            source: None,
        }
    }

    pub fn per_source(
        rule_id: impl Into<RuleId>,
        nominal: NominalTime,
        source: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            nominal,
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}@{}/{}", self.rule_id, self.nominal, source),
            None => write!(f, "{}@{}", self.rule_id, self.nominal),
        }
    }
}

/// Lifecycle of a window.
///
/// `New -> Armed -> Triggered | TriggeredOnTimeout`. Terminal phases never
/// go back; `Abandoned` is used when a window is dropped without a command
/// (no data at timeout, or timeout retries exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    New,
    Armed,
    Triggered,
    TriggeredOnTimeout,
    Abandoned,
}

impl WindowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WindowPhase::Triggered | WindowPhase::TriggeredOnTimeout | WindowPhase::Abandoned
        )
    }
}

/// In-flight state for one window ("timer data").
#[derive(Debug)]
pub struct WindowState {
    key: WindowKey,
    phase: WindowPhase,
    timer: Option<TimerHandle>,
    deadline: Option<DateTime<Utc>>,
    timeout_attempts: u32,
    /// Best (lowest) elevation per source, for scan-based composites.
    pub elevations: ElevationCandidates,
    /// Accepted scans per elevation angle, for volumes.
    pub scans: VolumeScans,
}

impl WindowState {
    pub fn new(key: WindowKey) -> Self {
        Self {
            key,
            phase: WindowPhase::New,
            timer: None,
            deadline: None,
            timeout_attempts: 0,
            elevations: ElevationCandidates::default(),
            scans: VolumeScans::default(),
        }
    }

    pub fn key(&self) -> &WindowKey {
        &self.key
    }

    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    pub fn timer(&self) -> Option<&TimerHandle> {
        self.timer.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn timeout_attempts(&self) -> u32 {
        self.timeout_attempts
    }

    pub(crate) fn arm(&mut self, timer: TimerHandle, deadline: DateTime<Utc>) {
        self.timer = Some(timer);
        self.deadline = Some(deadline);
        self.phase = WindowPhase::Armed;
    }

    /// The timer fired or was cancelled; the window stays open.
    pub(crate) fn disarm(&mut self) -> Option<TimerHandle> {
        if !self.phase.is_terminal() {
            self.phase = WindowPhase::New;
        }
        self.timer.take()
    }

    pub(crate) fn note_timeout_attempt(&mut self) -> u32 {
        self.timeout_attempts += 1;
        self.timeout_attempts
    }

    pub(crate) fn close(&mut self, phase: WindowPhase) -> Option<TimerHandle> {
        debug_assert!(phase.is_terminal());
        self.phase = phase;
        self.timer.take()
    }
}

impl PartialEq for WindowState {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for WindowState {}

pub type SharedWindow = Arc<Mutex<WindowState>>;

/// Windows without a timer are dropped once their nominal time is this many
/// window spans in the past. Their files stay in the catalog, so a late
/// arrival rebuilds the window from scratch.
pub const IDLE_WINDOW_SPANS: i32 = 4;

/// Concurrent map of open windows for one rule.
#[derive(Debug, Default)]
pub struct WindowTable {
    windows: Mutex<HashMap<WindowKey, SharedWindow>>,
}

impl WindowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the window for `key`, creating it if absent. The map lock is
    /// only held for the lookup itself.
    pub fn get_or_create(&self, key: &WindowKey) -> SharedWindow {
        let mut windows = self.lock();
        Arc::clone(
            windows
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(WindowState::new(key.clone())))),
        )
    }

    pub fn get(&self, key: &WindowKey) -> Option<SharedWindow> {
        self.lock().get(key).cloned()
    }

    /// Remove `key` only if it still maps to `window`, so a closed window
    /// never evicts a fresh one created for the same key.
    pub fn remove_if_same(&self, key: &WindowKey, window: &SharedWindow) -> bool {
        let mut windows = self.lock();
        match windows.get(key) {
            Some(current) if Arc::ptr_eq(current, window) => {
                windows.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Drop windows older than `horizon` that have no timer outstanding.
    /// Windows busy in another evaluation are left for the next sweep.
    pub fn evict_idle_before(&self, horizon: DateTime<Utc>) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|key, window| {
            if key.nominal.as_datetime() >= horizon {
                return true;
            }
            match window.try_lock() {
                Ok(state) => state.timer().is_some(),
                Err(TryLockError::Poisoned(p)) => p.into_inner().timer().is_some(),
                Err(TryLockError::WouldBlock) => true,
            }
        });
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn phase(&self, key: &WindowKey) -> Option<WindowPhase> {
        self.get(key).map(|w| lock_window(&w).phase())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WindowKey, SharedWindow>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lock a window, recovering from poisoning: a panic in one evaluation must
/// not wedge the window for every later arrival.
pub fn lock_window(window: &SharedWindow) -> MutexGuard<'_, WindowState> {
    window.lock().unwrap_or_else(|e| e.into_inner())
}
