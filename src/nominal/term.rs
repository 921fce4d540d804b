// src/nominal/term.rs

use chrono::{DateTime, Duration, Timelike, Utc};

use super::{NominalTime, TimeRange, truncate_to_hour};
use crate::errors::{EngineError, Result};

/// Term lengths (hours) that divide a day evenly.
pub const VALID_TERM_HOURS: [u32; 8] = [1, 2, 3, 4, 6, 8, 12, 24];

/// Term-offset window policy used by accumulation rules.
///
/// Terms are `hours` long and the first term of the day starts at
/// `first_offset` (UTC hour), so terms need not start at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term {
    hours: u32,
    first_offset: u32,
}

impl Term {
    pub fn new(hours: u32, first_offset: u32) -> Result<Self> {
        if !VALID_TERM_HOURS.contains(&hours) {
            return Err(EngineError::Config(format!(
                "term length must be one of {:?} hours (got {})",
                VALID_TERM_HOURS, hours
            )));
        }
        if first_offset > 23 {
            return Err(EngineError::Config(format!(
                "first term offset must be within 0..=23 (got {})",
                first_offset
            )));
        }
        Ok(Self {
            hours,
            first_offset,
        })
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn first_offset(&self) -> u32 {
        self.first_offset
    }

    /// Most recent hour `h <= t` with `(h - offset) mod hours == 0`.
    pub fn nominal(&self, t: DateTime<Utc>) -> NominalTime {
        let hour = i64::from(t.hour());
        let back = (hour - i64::from(self.first_offset)).rem_euclid(i64::from(self.hours));
        NominalTime(truncate_to_hour(t) - Duration::hours(back))
    }

    /// The term that ends at `nominal`: `(nominal - T, nominal]`.
    pub fn window(&self, nominal: NominalTime) -> TimeRange {
        let end = nominal.as_datetime();
        TimeRange::ending_at(end - Duration::hours(i64::from(self.hours)), end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn twelve_hour_term_with_offset_six() {
        let term = Term::new(12, 6).unwrap();

        let t = Utc.with_ymd_and_hms(2024, 6, 2, 7, 0, 0).unwrap();
        assert_eq!(
            term.nominal(t).as_datetime(),
            Utc.with_ymd_and_hms(2024, 6, 2, 6, 0, 0).unwrap()
        );

        let t = Utc.with_ymd_and_hms(2024, 6, 2, 5, 0, 0).unwrap();
        assert_eq!(
            term.nominal(t).as_datetime(),
            Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn boundary_hour_is_its_own_nominal() {
        let term = Term::new(6, 0).unwrap();
        let t = Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap();
        assert_eq!(term.nominal(t).as_datetime(), t);
    }

    #[test]
    fn rejects_bad_term_configuration() {
        assert!(Term::new(5, 0).is_err());
        assert!(Term::new(0, 0).is_err());
        assert!(Term::new(12, 24).is_err());
        assert!(Term::new(24, 23).is_ok());
    }

    #[test]
    fn window_ends_inclusively_at_nominal() {
        let term = Term::new(3, 0).unwrap();
        let n = term.nominal(Utc.with_ymd_and_hms(2024, 6, 2, 4, 30, 0).unwrap());
        let w = term.window(n);
        assert!(w.contains(Utc.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).unwrap()));
        assert!(w.contains(Utc.with_ymd_and_hms(2024, 6, 2, 0, 15, 0).unwrap()));
        assert!(!w.contains(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()));
    }
}
