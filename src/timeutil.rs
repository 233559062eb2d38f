//! Duration and relative-time parsing for time-series generation.
//!
//! Durations use the grammar `<N><unit>[<N><unit>...]` with units
//! s, m, h, d, w (e.g. `90s`, `15m`, `1h30m`, `2d`). Times are RFC3339 or
//! relative (`-7d`, `+1h`) against a supplied anchor.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("empty duration string")]
    EmptyDuration,

    #[error("invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("unknown duration unit: {0}")]
    UnknownUnit(char),

    #[error("empty time string")]
    EmptyTime,

    #[error("relative time must start with + or -: {0}")]
    NotRelative(String),
}

/// Parse a duration like `30s`, `5m`, `1h30m`, `2d`, or `1w`.
pub fn parse_duration(s: &str) -> Result<Duration, TimeParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeParseError::EmptyDuration);
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut saw_component = false;

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(TimeParseError::InvalidDuration(s.to_string()));
        }
        let n: i64 = digits
            .parse()
            .map_err(|_| TimeParseError::InvalidDuration(s.to_string()))?;
        digits.clear();
        total += match c {
            's' => Duration::seconds(n),
            'm' => Duration::minutes(n),
            'h' => Duration::hours(n),
            'd' => Duration::days(n),
            'w' => Duration::weeks(n),
            other => return Err(TimeParseError::UnknownUnit(other)),
        };
        saw_component = true;
    }

    if !digits.is_empty() || !saw_component {
        return Err(TimeParseError::InvalidDuration(s.to_string()));
    }

    Ok(total)
}

/// Parse an RFC3339 timestamp, or a `+`/`-` prefixed duration relative to
/// `now`.
pub fn parse_relative_time(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeParseError::EmptyTime);
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }

    let (negative, rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => return Err(TimeParseError::NotRelative(s.to_string())),
    };

    let dur = parse_duration(rest)?;
    Ok(if negative { now - dur } else { now + dur })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_single_unit_durations() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("3d").unwrap(), Duration::days(3));
        assert_eq!(parse_duration("1w").unwrap(), Duration::weeks(1));
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::hours(1) + Duration::minutes(30)
        );
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("12").is_err());
        assert!(parse_duration("5x").is_err());
    }

    #[test]
    fn parses_rfc3339() {
        let now = Utc::now();
        let t = parse_relative_time("2024-03-01T12:00:00Z", now).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn parses_relative_offsets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_relative_time("-7d", now).unwrap(),
            now - Duration::days(7)
        );
        assert_eq!(
            parse_relative_time("+2h", now).unwrap(),
            now + Duration::hours(2)
        );
    }

    #[test]
    fn rejects_bare_durations_as_times() {
        assert!(parse_relative_time("7d", Utc::now()).is_err());
    }
}
