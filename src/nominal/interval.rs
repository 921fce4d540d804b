// src/nominal/interval.rs

use chrono::{DateTime, Duration, Timelike, Utc};

use super::{NominalTime, TimeRange};
use crate::errors::{EngineError, Result};

/// Interval lengths (minutes) that divide an hour evenly.
pub const VALID_INTERVALS: [u32; 12] = [1, 2, 3, 4, 5, 6, 10, 12, 15, 20, 30, 60];

/// Fixed-interval window policy used by composites and volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval(u32);

impl Interval {
    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    /// Truncate `t` to the most recent multiple of the interval within the
    /// hour, seconds zeroed.
    pub fn nominal(&self, t: DateTime<Utc>) -> NominalTime {
        let excess_minutes = t.minute() % self.0;
        let snapped = t
            - Duration::minutes(i64::from(excess_minutes))
            - Duration::seconds(i64::from(t.second()))
            - Duration::nanoseconds(i64::from(t.nanosecond()));
        NominalTime(snapped)
    }

    /// `[nominal, nominal + I)`
    pub fn window(&self, nominal: NominalTime) -> TimeRange {
        let start = nominal.as_datetime();
        TimeRange::half_open(start, start + self.duration())
    }
}

impl TryFrom<u32> for Interval {
    type Error = EngineError;

    fn try_from(minutes: u32) -> Result<Self> {
        if VALID_INTERVALS.contains(&minutes) {
            Ok(Interval(minutes))
        } else {
            Err(EngineError::Config(format!(
                "interval must be one of {:?} minutes (got {})",
                VALID_INTERVALS, minutes
            )))
        }
    }
}
