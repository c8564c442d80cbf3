//! Forcing series time alignment.
//!
//! Maps a simulation start time onto the integer step offset (`nstrtini`) of an
//! external forcing series with a known start and fixed hourly frequency.
//! Arithmetic is done on whole seconds so month-long spans stay exact; any
//! sub-second part of the span is a misalignment on its own.

use chrono::{NaiveDateTime, TimeDelta};

use super::errors::AlignmentError;

const SECONDS_PER_HOUR: i64 = 3600;

/// Number of forcing steps between `forcing_start` and `target`.
///
/// Fails if `target` precedes the series or does not fall exactly on a step.
pub fn compute_offset(
    target: NaiveDateTime,
    forcing_start: NaiveDateTime,
    frequency_hours: u32,
) -> Result<u64, AlignmentError> {
    if frequency_hours == 0 {
        return Err(AlignmentError::ZeroFrequency);
    }

    let delta = target - forcing_start;
    if delta < TimeDelta::zero() {
        return Err(AlignmentError::BeforeForcingStart {
            target,
            forcing_start,
        });
    }

    let elapsed = delta.num_seconds();
    let subsec_nanos = delta.subsec_nanos();
    let step = i64::from(frequency_hours) * SECONDS_PER_HOUR;
    let remainder_seconds = elapsed % step;
    if remainder_seconds != 0 || subsec_nanos != 0 {
        return Err(AlignmentError::Misaligned {
            target,
            forcing_start,
            frequency_hours,
            remainder: TimeDelta::seconds(remainder_seconds)
                + TimeDelta::nanoseconds(i64::from(subsec_nanos)),
        });
    }

    // elapsed >= 0 checked above
    Ok((elapsed / step).unsigned_abs())
}

/// Parse a timestamp as `YYYY-MM-DDTHH:MM[:SS]` (a space also separates date and time).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let normalized = value.trim().replacen(' ', "T", 1);
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_offset_on_step() {
        let offset = compute_offset(ts("2014-07-01T18:00"), ts("2014-07-01T00:00"), 6).unwrap();
        assert_eq!(offset, 3);
    }

    #[test]
    fn test_offset_zero_at_start() {
        let start = ts("2020-04-12T00:00");
        assert_eq!(compute_offset(start, start, 1).unwrap(), 0);
    }

    #[test]
    fn test_misaligned_target_fails() {
        let err = compute_offset(ts("2014-07-01T19:00"), ts("2014-07-01T00:00"), 6).unwrap_err();
        assert_eq!(
            err,
            AlignmentError::Misaligned {
                target: ts("2014-07-01T19:00"),
                forcing_start: ts("2014-07-01T00:00"),
                frequency_hours: 6,
                remainder: TimeDelta::hours(1),
            }
        );
    }

    #[test]
    fn test_fractional_second_past_step_fails() {
        let start = ts("2014-07-01T00:00");
        let target = ts("2014-07-01T18:00") + TimeDelta::milliseconds(500);
        let err = compute_offset(target, start, 6).unwrap_err();
        assert_eq!(
            err,
            AlignmentError::Misaligned {
                target,
                forcing_start: start,
                frequency_hours: 6,
                remainder: TimeDelta::milliseconds(500),
            }
        );
    }

    #[test]
    fn test_fractional_second_before_start_fails() {
        let start = ts("2014-07-01T00:00");
        let target = start - TimeDelta::milliseconds(1);
        assert!(matches!(
            compute_offset(target, start, 6),
            Err(AlignmentError::BeforeForcingStart { .. })
        ));
    }

    #[test]
    fn test_sub_hour_misalignment_fails() {
        assert!(compute_offset(ts("2020-04-16T00:30"), ts("2020-04-12T00:00"), 1).is_err());
    }

    #[test]
    fn test_target_before_start_fails() {
        let err = compute_offset(ts("2014-06-30T18:00"), ts("2014-07-01T00:00"), 6).unwrap_err();
        assert!(matches!(err, AlignmentError::BeforeForcingStart { .. }));
    }

    #[test]
    fn test_zero_frequency_fails() {
        let start = ts("2014-07-01T00:00");
        assert_eq!(compute_offset(start, start, 0), Err(AlignmentError::ZeroFrequency));
    }

    #[test]
    fn test_exact_over_months() {
        // 2020-04-12 .. 2020-06-30 hourly, crossing month boundaries
        let offset = compute_offset(ts("2020-06-30T23:00"), ts("2020-04-12T00:00"), 1).unwrap();
        assert_eq!(offset, (19 + 31 + 29) * 24 + 23);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(ts("2014-07-01 18:00"), ts("2014-07-01T18:00:00"));
        assert!(parse_timestamp("07/01/2014").is_err());
    }
}
