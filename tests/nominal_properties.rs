use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use proptest::prelude::*;

use radargen::nominal::interval::VALID_INTERVALS;
use radargen::nominal::term::VALID_TERM_HOURS;
use radargen::nominal::{Interval, Term};

// 2000-01-01 .. 2040-01-01, second resolution.
fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..2_208_988_800i64).prop_map(|s| Utc.timestamp_opt(s, 0).unwrap())
}

fn interval() -> impl Strategy<Value = Interval> {
    proptest::sample::select(VALID_INTERVALS.to_vec())
        .prop_map(|m| Interval::try_from(m).unwrap())
}

fn term() -> impl Strategy<Value = Term> {
    (proptest::sample::select(VALID_TERM_HOURS.to_vec()), 0u32..24)
        .prop_map(|(hours, offset)| Term::new(hours, offset).unwrap())
}

proptest! {
    #[test]
    fn timestamps_in_one_bucket_share_a_nominal_time(
        interval in interval(),
        t in timestamp(),
        shift in 0i64..3600,
    ) {
        let nominal = interval.nominal(t).as_datetime();
        prop_assert!(nominal <= t);
        prop_assert!(t - nominal < interval.duration());
        prop_assert_eq!(nominal.second(), 0);

        // Any other instant of the same bucket maps to the same start.
        let bucket_secs = interval.duration().num_seconds();
        let other = nominal + Duration::seconds(shift % bucket_secs);
        prop_assert_eq!(interval.nominal(other).as_datetime(), nominal);
    }

    #[test]
    fn term_nominal_is_the_latest_term_boundary(term in term(), t in timestamp()) {
        let nominal = term.nominal(t).as_datetime();
        prop_assert!(nominal <= t);
        prop_assert!(t - nominal < Duration::hours(i64::from(term.hours())));
        prop_assert_eq!(nominal.minute(), 0);
        prop_assert_eq!(nominal.second(), 0);

        let hour = i64::from(nominal.hour());
        let offset = i64::from(term.first_offset());
        prop_assert_eq!((hour - offset).rem_euclid(i64::from(term.hours())), 0);

        // The term's window ends at its nominal time.
        prop_assert!(term.window(term.nominal(t)).contains(nominal));
    }
}

#[test]
fn twelve_hour_term_with_offset_six_example() {
    let term = Term::new(12, 6).unwrap();
    let nominal = |h| {
        term.nominal(Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap())
            .as_datetime()
    };
    assert_eq!(nominal(7), Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap());
    assert_eq!(nominal(5), Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap());
}
