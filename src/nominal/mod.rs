// src/nominal/mod.rs

//! Nominal time computation.
//!
//! Every product window is identified by a *nominal time*: the arrival
//! timestamp snapped to the start (or, for terms, the end) of its window.
//! Both policies here are pure functions of `(time, config)`, which is what
//! makes the nominal time usable as a dedup key.
//!
//! - [`interval`] snaps to `I`-minute buckets within the hour.
//! - [`term`] snaps to `T`-hour terms shifted by a first-term offset.

pub mod interval;
pub mod term;

use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub use interval::Interval;
pub use term::Term;

/// Canonical window timestamp. Equality is by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NominalTime(DateTime<Utc>);

impl NominalTime {
    /// Use a timestamp as-is (sub-second precision dropped).
    ///
    /// Used by per-file rules where the observation time already is the
    /// window identity.
    pub fn exact(t: DateTime<Utc>) -> Self {
        Self(t - Duration::nanoseconds(i64::from(t.nanosecond())))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// `YYYYMMDD`, as passed in `--date=`.
    pub fn date_arg(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// `HHMMSS`, as passed in `--time=`.
    pub fn time_arg(&self) -> String {
        self.0.format("%H%M%S").to_string()
    }
}

impl fmt::Display for NominalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

/// Which end of a [`TimeRange`] is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBounds {
    /// `[start, end)`
    StartInclusive,
    /// `(start, end]`
    EndInclusive,
}

/// Time span passed to catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bounds: RangeBounds,
}

impl TimeRange {
    pub fn half_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            bounds: RangeBounds::StartInclusive,
        }
    }

    pub fn ending_at(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            bounds: RangeBounds::EndInclusive,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        match self.bounds {
            RangeBounds::StartInclusive => t >= self.start && t < self.end,
            RangeBounds::EndInclusive => t > self.start && t <= self.end,
        }
    }
}

/// Drop minutes, seconds and sub-seconds.
pub(crate) fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::minutes(i64::from(t.minute()))
        - Duration::seconds(i64::from(t.second()))
        - Duration::nanoseconds(i64::from(t.nanosecond()))
}
