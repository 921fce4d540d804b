// src/timeout/mod.rs

//! One-shot window timeouts.
//!
//! - [`coordinator`] owns the timers: at most one outstanding per window,
//!   each firing its owner exactly once unless cancelled first.
//! - [`deadline`] computes how long to wait for a window, anchored either
//!   on its nominal time or on its first arrival.

pub mod coordinator;
pub mod deadline;

use std::fmt;

use crate::window::WindowKey;

pub use coordinator::{TimeoutCoordinator, TimerHandle};
pub use deadline::{Deadline, timeout_deadline};

/// Why a timer was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Deadline is `nominal + timeout`.
    Nominal,
    /// Deadline is `first arrival + timeout`.
    Arrival,
    /// Re-armed after a failed timeout attempt.
    Retry,
    /// Re-armed at startup for a window recovered from the ledger.
    Recovered,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutKind::Nominal => "nominal",
            TimeoutKind::Arrival => "arrival",
            TimeoutKind::Retry => "retry",
            TimeoutKind::Recovered => "recovered",
        };
        f.write_str(s)
    }
}

/// Receiver of expired timers.
///
/// Called on a blocking worker thread, never while the coordinator holds
/// its own lock, so implementations may register new timers.
pub trait TimeoutOwner: Send + Sync {
    fn on_timeout(&self, kind: TimeoutKind, key: WindowKey);
}
