// src/timeout/deadline.rs

use chrono::{DateTime, Duration, Utc};

use crate::nominal::NominalTime;
use crate::types::TimeoutMode;

/// When a window times out, and how long that is from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub at: DateTime<Utc>,
    pub delay: std::time::Duration,
}

/// Compute the timeout deadline for a window.
///
/// - `Nominal`: `max(0, nominal + timeout - now)`.
/// - `Arrival`: a fixed `timeout` from `now` (the first arrival).
pub fn timeout_deadline(
    mode: TimeoutMode,
    nominal: NominalTime,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Deadline {
    let at = match mode {
        TimeoutMode::Nominal => nominal.as_datetime() + timeout,
        TimeoutMode::Arrival => now + timeout,
    };
    Deadline {
        at,
        delay: delay_until(at, now),
    }
}

/// Non-negative wait from `now` until `at`.
pub fn delay_until(at: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (at - now).to_std().unwrap_or(std::time::Duration::ZERO)
}
