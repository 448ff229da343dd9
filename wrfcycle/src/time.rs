//! Time-related utility functions.
//!
//! Cycle timestamps arrive in several textual forms: the workflow-suite
//! cycle point (`20140301T0600+01`), the short date used in configuration
//! (`2014-03-01_06`), the model's own timestamp (`2014-03-01_06:00:00`) and
//! RFC 3339. All of them are normalized to a naive UTC [`NaiveDateTime`].

use chrono::{DateTime, Duration, NaiveDateTime};
use thiserror::Error;

/// Timestamp format used by the model in file names and namelists.
pub const MODEL_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Short date format used in configuration files.
pub const CONFIG_TIME_FORMAT: &str = "%Y-%m-%d_%H";

const CYCLE_POINT_FORMAT: &str = "%Y%m%dT%H%M";

/// Error returned when a timestamp cannot be parsed.
#[derive(Debug, Error)]
#[error("unrecognized cycle time '{input}': expected YYYYmmddTHHMM[+ZZ], YYYY-mm-dd_HH[:MM:SS] or RFC 3339")]
pub struct TimeParseError {
    /// The rejected input.
    pub input: String,
}

/// Parse a cycle start time from any of the supported formats.
///
/// Time zone offsets are discarded, matching how the workflow suite passes
/// local cycle points that the model treats as UTC.
pub fn parse_cycle_time(input: &str) -> Result<NaiveDateTime, TimeParseError> {
    let trimmed = input.trim();

    if let Some(dt) = parse_cycle_point(trimmed) {
        return Ok(dt);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, MODEL_TIME_FORMAT) {
        return Ok(dt);
    }

    // chrono needs minutes to build a datetime, so pad the short form.
    let padded_format = format!("{CONFIG_TIME_FORMAT}:%M");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&format!("{trimmed}:00"), &padded_format) {
        return Ok(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }

    Err(TimeParseError {
        input: input.to_string(),
    })
}

/// Parses `YYYYmmddTHHMM` with an optional `+ZZ`, `-ZZ` or `Z` suffix.
fn parse_cycle_point(input: &str) -> Option<NaiveDateTime> {
    let core = input.get(..13)?;
    let suffix = &input[13..];
    if !(suffix.is_empty() || suffix.starts_with(['+', '-', 'Z'])) {
        return None;
    }
    NaiveDateTime::parse_from_str(core, CYCLE_POINT_FORMAT).ok()
}

/// Format a timestamp the way the model names its files.
pub fn model_time(time: &NaiveDateTime) -> String {
    time.format(MODEL_TIME_FORMAT).to_string()
}

/// Split a duration into days, hours, minutes and seconds.
///
/// Negative durations are clamped to zero.
pub fn split_duration(duration: Duration) -> (i64, i64, i64, i64) {
    let total = duration.num_seconds().max(0);
    (
        total / 86_400,
        (total % 86_400) / 3600,
        (total % 3600) / 60,
        total % 60,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymdh(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parses_cycle_point_with_offset() {
        let dt = parse_cycle_time("20140301T0600+01").unwrap();
        assert_eq!(dt, ymdh(2014, 3, 1, 6));
    }

    #[test]
    fn test_parses_cycle_point_with_negative_offset() {
        let dt = parse_cycle_time("20140301T1800-05").unwrap();
        assert_eq!(dt, ymdh(2014, 3, 1, 18));
    }

    #[test]
    fn test_parses_config_short_form() {
        assert_eq!(parse_cycle_time("2014-03-01_06").unwrap(), ymdh(2014, 3, 1, 6));
    }

    #[test]
    fn test_parses_model_timestamp() {
        assert_eq!(
            parse_cycle_time("2014-03-01_06:00:00").unwrap(),
            ymdh(2014, 3, 1, 6)
        );
    }

    #[test]
    fn test_parses_rfc3339() {
        assert_eq!(
            parse_cycle_time("2014-03-01T06:00:00Z").unwrap(),
            ymdh(2014, 3, 1, 6)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let err = parse_cycle_time("yesterday").unwrap_err();
        assert_eq!(err.input, "yesterday");
    }

    #[test]
    fn test_model_time_round_trips_through_parser() {
        let dt = ymdh(2020, 12, 31, 23);
        assert_eq!(model_time(&dt), "2020-12-31_23:00:00");
        assert_eq!(parse_cycle_time(&model_time(&dt)).unwrap(), dt);
    }

    #[test]
    fn test_split_duration_components() {
        let d = Duration::seconds(86_400 + 2 * 3600 + 3 * 60 + 4);
        assert_eq!(split_duration(d), (1, 2, 3, 4));
        assert_eq!(split_duration(Duration::seconds(-5)), (0, 0, 0, 0));
    }
}
