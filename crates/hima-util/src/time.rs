//! Time utilities for hima
//!
//! Instants cross the backend boundary as ISO-8601 strings. They are parsed
//! into `DateTime<Utc>` here so every comparison happens on one representation,
//! whatever offset the backend or the device used when writing them.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `HIMA_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for checking expiration sweeps and the 03:00 rollover by hand.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 23:30:00`)
//!
//! Example:
//! ```bash
//! HIMA_MOCK_TIME="2025-12-25 23:30:00" hima status <group-id>
//! ```

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "HIMA_MOCK_TIME";

/// Format accepted by `HIMA_MOCK_TIME`
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT)
            else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    "Failed to convert mock time to local timezone"
                );
                return None;
            };
            let offset = mock_dt.signed_duration_since(chrono::Local::now());
            tracing::info!(
                mock_time = %mock_time_str,
                offset_secs = offset.num_seconds(),
                "Mock time enabled"
            );
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Current instant in UTC, respecting mock time.
pub fn now_utc() -> DateTime<Utc> {
    now().with_timezone(&Utc)
}

/// Parse an ISO-8601 / RFC 3339 timestamp into a UTC instant.
///
/// Also accepts the `+00` short offset PostgreSQL emits for `timestamptz`
/// and a space instead of `T`. Returns `None` for anything else.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = value.replacen(' ', "T", 1);
    for format in ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    None
}

/// Format an instant the way the backend stores it: RFC 3339, milliseconds, `Z`.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a DateTime for display as a wall clock time.
pub fn format_clock_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset};

    #[test]
    fn test_parse_instant_utc() {
        let parsed = parse_instant("2024-01-01T10:00:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_normalizes_offsets() {
        let tokyo = parse_instant("2024-03-11T03:00:00+09:00").unwrap();
        let utc = parse_instant("2024-03-10T18:00:00.000Z").unwrap();
        assert_eq!(tokyo, utc);
    }

    #[test]
    fn test_parse_instant_postgres_style() {
        let parsed = parse_instant("2024-01-01 10:00:00.123456+00").unwrap();
        assert_eq!(parsed.timestamp(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        for input in ["", "tomorrow", "2024-01-01", "10:00:00", "2024-13-01T00:00:00Z"] {
            assert!(parse_instant(input).is_none(), "expected {input:?} to be rejected");
        }
    }

    #[test]
    fn test_format_instant() {
        let instant = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 11, 3, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_instant(&instant), "2024-03-10T18:00:00.000Z");
        assert_eq!(parse_instant(&format_instant(&instant)), Some(instant));
    }

    #[test]
    fn test_format_clock_time() {
        let dt = Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 45).unwrap();
        assert_eq!(format_clock_time(&dt), "14:30");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
        assert!((now_utc() - t.with_timezone(&Utc)).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_parse_mock_time_format() {
        assert!(NaiveDateTime::parse_from_str("2025-12-25 23:30:00", MOCK_TIME_FORMAT).is_ok());
        assert!(NaiveDateTime::parse_from_str("2025-12-25T23:30:00", MOCK_TIME_FORMAT).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_is_mock_time_active_in_debug() {
        // OnceLock makes the env var untestable in-process; only check it doesn't panic
        let _ = is_mock_time_active();
    }
}
