//! Conversions between Nightscout millisecond dates and calendar time.

use chrono::{DateTime, Utc};

/// Layout of the `dateString` field expected by the Nightscout upload API.
pub const DATE_STRING_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

const MILLIS_PER_SECOND: i64 = 1_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// Convert epoch milliseconds to a UTC timestamp.
///
/// The value is split into whole seconds and a sub-second remainder using
/// Euclidean division, so negative dates land on the correct instant too.
/// Values beyond chrono's representable range saturate to
/// [`DateTime::<Utc>::MIN_UTC`] / [`DateTime::<Utc>::MAX_UTC`].
pub fn to_timestamp(millis: i64) -> DateTime<Utc> {
    let secs = millis.div_euclid(MILLIS_PER_SECOND);
    let nanos = millis.rem_euclid(MILLIS_PER_SECOND) as u32 * NANOS_PER_MILLI;
    DateTime::from_timestamp(secs, nanos).unwrap_or(if millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Convert a timestamp to epoch milliseconds, discarding anything below 1ms.
pub fn to_epoch_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Format a timestamp the way Nightscout's `dateString` field expects.
pub fn date_string(time: DateTime<Utc>) -> String {
    time.format(DATE_STRING_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_known_dates() {
        let cases = [
            (1230786000000, Utc.with_ymd_and_hms(2009, 1, 1, 5, 0, 0).unwrap()),
            (1249871143000, Utc.with_ymd_and_hms(2009, 8, 10, 2, 25, 43).unwrap()),
            (1298091985000, Utc.with_ymd_and_hms(2011, 2, 19, 5, 6, 25).unwrap()),
            (1469042740000, Utc.with_ymd_and_hms(2016, 7, 20, 19, 25, 40).unwrap()),
            (1480132712000, Utc.with_ymd_and_hms(2016, 11, 26, 3, 58, 32).unwrap()),
            (1505625229000, Utc.with_ymd_and_hms(2017, 9, 17, 5, 13, 49).unwrap()),
        ];

        for (millis, time) in cases {
            assert_eq!(to_timestamp(millis), time, "to_timestamp({})", millis);
            assert_eq!(to_epoch_millis(time), millis, "to_epoch_millis({})", time);
        }
    }

    #[test]
    fn test_sub_second_precision_is_kept() {
        let time = to_timestamp(1505625229123);
        assert_eq!(time.timestamp_subsec_millis(), 123);
        assert_eq!(to_epoch_millis(time), 1505625229123);
    }

    #[test]
    fn test_negative_millis() {
        let time = to_timestamp(-1);
        assert_eq!(time, Utc.timestamp_opt(0, 0).unwrap() - Duration::milliseconds(1));
        assert_eq!(to_epoch_millis(time), -1);
    }

    #[test]
    fn test_sub_millisecond_remainder_is_truncated() {
        let base = to_timestamp(1505625229000);
        let time = base + Duration::nanoseconds(999_999);
        assert_eq!(to_epoch_millis(time), 1505625229000);
    }

    #[test]
    fn test_out_of_range_saturates() {
        assert_eq!(to_timestamp(i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(to_timestamp(i64::MIN), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_date_string_format() {
        let time = to_timestamp(1505625229042);
        assert_eq!(date_string(time), "2017-09-17T05:13:49.042+0000");
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        // Roughly +/- 200,000 years, well inside chrono's range.
        const LIMIT: i64 = 6_000_000_000_000_000;

        proptest! {
            #[test]
            fn millis_round_trip(millis in -LIMIT..LIMIT) {
                prop_assert_eq!(to_epoch_millis(to_timestamp(millis)), millis);
            }

            #[test]
            fn timestamp_round_trip_to_the_millisecond(
                secs in -6_000_000_000_000i64..6_000_000_000_000,
                nanos in 0u32..1_000_000_000
            ) {
                let time = DateTime::from_timestamp(secs, nanos).unwrap();
                let back = to_timestamp(to_epoch_millis(time));
                prop_assert_eq!(back.timestamp(), secs);
                prop_assert_eq!(back.timestamp_subsec_millis(), nanos / 1_000_000);
            }
        }
    }
}
