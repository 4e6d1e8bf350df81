//! Fixed-offset time helpers.
//!
//! All interval arithmetic in the engine happens in a single fixed UTC
//! offset (+05:30). Boundary timestamps are rendered with second
//! precision as `YYYY-MM-DDTHH:MM:SS+05:30`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// The engine's fixed UTC offset in seconds (+05:30).
pub const OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// The fixed +05:30 offset used for all interval arithmetic.
pub fn offset() -> FixedOffset {
    // OFFSET_SECS is well inside the valid range, so this cannot fail.
    FixedOffset::east_opt(OFFSET_SECS).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// Current wall-clock time expressed in the fixed offset.
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset())
}

/// Combine a calendar date and a time of day in the fixed offset.
pub fn at(date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
    let ndt = date.and_time(time);
    // A fixed offset never produces ambiguous local times.
    ndt.and_local_timezone(offset())
        .single()
        .unwrap_or_else(|| offset().from_utc_datetime(&ndt))
}

/// Midnight of `date` in the fixed offset.
pub fn midnight(date: NaiveDate) -> DateTime<FixedOffset> {
    at(date, NaiveTime::MIN)
}

/// A whole hour of `date` in the fixed offset. Out-of-range values clamp
/// rather than panic; callers validate hours upstream.
pub fn at_hm(date: NaiveDate, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);
    at(date, time)
}

/// Render a boundary timestamp: `YYYY-MM-DDTHH:MM:SS+05:30`.
pub fn format_ts(dt: DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Parse a boundary timestamp back into the fixed offset.
pub fn parse_ts(s: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_format_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let dt = at_hm(date, 10, 30);
        let s = format_ts(dt);
        assert_eq!(s, "2026-08-24T10:30:00+05:30");

        let parsed = parse_ts(&s).unwrap();
        assert_eq!(parsed, dt);
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.minute(), 30);
    }

    #[test]
    fn test_midnight() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let dt = midnight(date);
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.day(), 1);
        assert_eq!(format_ts(dt), "2026-01-01T00:00:00+05:30");
    }

    #[test]
    fn test_at_hm_clamps_out_of_range() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let dt = at_hm(date, 99, 99);
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.minute(), 59);
    }
}
