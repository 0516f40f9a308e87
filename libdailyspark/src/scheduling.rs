//! Parsing of human-friendly schedule times
//!
//! Accepted forms, tried in order:
//! - RFC 3339 timestamps: `2025-11-20T15:00:00Z`
//! - `YYYY-MM-DD HH:MM`, read as UTC
//! - Relative durations: `30m`, `2h`, `1d 6h`
//! - Natural language: `tomorrow 9am`, `next monday`
//!
//! Relative forms resolve against the `now` passed in, which keeps results
//! reproducible in tests.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{Result, SparkError};

pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SparkError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Ok(naive.and_utc());
    }

    if let Some(duration) = parse_duration(input) {
        return Ok(now + duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|e| {
        SparkError::InvalidInput(format!("Could not parse schedule '{}': {}", input, e))
    })
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::from_std(std_duration).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = parse_schedule("2025-06-03T10:00:00+02:00", fixed_now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_date_and_minutes_as_utc() {
        let dt = parse_schedule("2025-11-20 15:00", fixed_now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 11, 20, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_durations() {
        let now = fixed_now();
        assert_eq!(parse_schedule("30m", now).unwrap(), now + Duration::minutes(30));
        assert_eq!(parse_schedule("2h", now).unwrap(), now + Duration::hours(2));
        assert_eq!(
            parse_schedule("1d 6h", now).unwrap(),
            now + Duration::hours(30)
        );
    }

    #[test]
    fn test_parse_tomorrow() {
        let now = fixed_now();
        let dt = parse_schedule("tomorrow", now).unwrap();
        let diff = (dt - now).num_hours();
        assert!((15..=40).contains(&diff), "Expected ~1 day, got {} hours", diff);
    }

    #[test]
    fn test_parse_empty_string() {
        let err = parse_schedule("   ", fixed_now()).unwrap_err();
        assert!(matches!(err, SparkError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_invalid_format() {
        let err = parse_schedule("whenever you like", fixed_now()).unwrap_err();
        assert!(err.to_string().contains("Could not parse schedule"));
    }
}
