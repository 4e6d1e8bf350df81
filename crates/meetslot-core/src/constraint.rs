//! Meeting time constraints and their resolution to concrete windows.
//!
//! Raw constraint text from the parser is opaque until it lands here.
//! `ConstraintSpec::parse` maps it to a structured constraint and
//! `resolve_window` turns that into a concrete `[start, end)` window
//! relative to an explicit "now", so resolution is deterministic in
//! tests.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::interval::{BusinessHours, Interval};
use crate::timefmt;

/// A structured meeting time constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintSpec {
    /// No day preference: any business slot in the coming week.
    AnyBusinessSlot,
    /// A day a fixed number of days from now ("tomorrow" is 1).
    RelativeDay { offset_days: i64 },
    /// The next occurrence of a weekday.
    NamedWeekday(Weekday),
    /// A weekday with an explicit time of day. The time is authoritative
    /// for high-priority anchoring.
    NamedWeekdayWithTime {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
}

fn day_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b(?:\s+at)?\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?",
        )
        .expect("hard-coded pattern compiles")
    })
}

fn day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
            .expect("hard-coded pattern compiles")
    })
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

impl ConstraintSpec {
    /// Parse free-form constraint text. Anything unrecognized maps to
    /// the conservative `AnyBusinessSlot` default.
    pub fn parse(text: &str) -> Self {
        let lowered = text.to_ascii_lowercase();

        if let Some(caps) = day_time_re().captures(text) {
            if let Some(weekday) = caps.get(1).and_then(|m| weekday_from_name(m.as_str())) {
                let mut hour: u32 = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                let minute: u32 = caps
                    .get(3)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                match caps.get(4).map(|m| m.as_str().to_ascii_lowercase()) {
                    Some(ref meridiem) if meridiem == "pm" && hour < 12 => hour += 12,
                    Some(ref meridiem) if meridiem == "am" && hour == 12 => hour = 0,
                    _ => {}
                }
                if hour < 24 && minute < 60 {
                    return ConstraintSpec::NamedWeekdayWithTime {
                        weekday,
                        hour,
                        minute,
                    };
                }
            }
        }

        if let Some(caps) = day_re().captures(text) {
            if let Some(weekday) = caps.get(1).and_then(|m| weekday_from_name(m.as_str())) {
                return ConstraintSpec::NamedWeekday(weekday);
            }
        }

        if lowered.contains("tomorrow") {
            return ConstraintSpec::RelativeDay { offset_days: 1 };
        }
        if lowered.contains("today") {
            return ConstraintSpec::RelativeDay { offset_days: 0 };
        }

        ConstraintSpec::AnyBusinessSlot
    }

    /// The explicit time anchor, when the constraint names one.
    pub fn anchor_hour_minute(&self) -> Option<(u32, u32)> {
        match self {
            ConstraintSpec::NamedWeekdayWithTime { hour, minute, .. } => Some((*hour, *minute)),
            _ => None,
        }
    }

    /// Resolve to a concrete `[start, end)` scheduling window.
    pub fn resolve_window(
        &self,
        now: DateTime<FixedOffset>,
        hours: BusinessHours,
    ) -> Interval {
        match self {
            ConstraintSpec::AnyBusinessSlot => {
                let start = timefmt::midnight(now.date_naive() + Duration::days(1));
                let end = timefmt::midnight(now.date_naive() + Duration::days(8));
                Interval { start, end }
            }
            ConstraintSpec::RelativeDay { offset_days } => {
                let date = now.date_naive() + Duration::days(*offset_days);
                single_day_window(date)
            }
            ConstraintSpec::NamedWeekday(weekday)
            | ConstraintSpec::NamedWeekdayWithTime { weekday, .. } => {
                let date = next_occurrence(*weekday, now, hours);
                single_day_window(date)
            }
        }
    }
}

impl fmt::Display for ConstraintSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintSpec::AnyBusinessSlot => write!(f, "any business slot"),
            ConstraintSpec::RelativeDay { offset_days: 0 } => write!(f, "today"),
            ConstraintSpec::RelativeDay { offset_days: 1 } => write!(f, "tomorrow"),
            ConstraintSpec::RelativeDay { offset_days } => {
                write!(f, "in {} days", offset_days)
            }
            ConstraintSpec::NamedWeekday(weekday) => write!(f, "next {}", weekday),
            ConstraintSpec::NamedWeekdayWithTime {
                weekday,
                hour,
                minute,
            } => write!(f, "next {} at {:02}:{:02}", weekday, hour, minute),
        }
    }
}

fn single_day_window(date: NaiveDate) -> Interval {
    Interval {
        start: timefmt::midnight(date),
        end: timefmt::midnight(date + Duration::days(1)),
    }
}

/// The next occurrence of `weekday` strictly usable from `now`: today
/// counts only while still before business-hours close.
fn next_occurrence(
    weekday: Weekday,
    now: DateTime<FixedOffset>,
    hours: BusinessHours,
) -> NaiveDate {
    let today = now.date_naive();
    if today.weekday() == weekday {
        let close = timefmt::at_hm(today, hours.end_hour, 0);
        if now < close {
            return today;
        }
        return today + Duration::days(7);
    }

    let ahead =
        (7 + weekday.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64)
            % 7;
    // ahead == 0 was handled above, but keep the wrap explicit.
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(ahead)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday 2026-08-24, 11:00 +05:30
    fn now() -> DateTime<FixedOffset> {
        timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(), 11, 0)
    }

    #[test]
    fn test_parse_day_with_time() {
        assert_eq!(
            ConstraintSpec::parse("let's meet Thursday at 14:30"),
            ConstraintSpec::NamedWeekdayWithTime {
                weekday: Weekday::Thu,
                hour: 14,
                minute: 30
            }
        );
        assert_eq!(
            ConstraintSpec::parse("tuesday 2pm works"),
            ConstraintSpec::NamedWeekdayWithTime {
                weekday: Weekday::Tue,
                hour: 14,
                minute: 0
            }
        );
    }

    #[test]
    fn test_parse_bare_day_and_relative() {
        assert_eq!(
            ConstraintSpec::parse("sometime Wednesday"),
            ConstraintSpec::NamedWeekday(Weekday::Wed)
        );
        assert_eq!(
            ConstraintSpec::parse("tomorrow morning"),
            ConstraintSpec::RelativeDay { offset_days: 1 }
        );
        assert_eq!(
            ConstraintSpec::parse("whenever is fine"),
            ConstraintSpec::AnyBusinessSlot
        );
    }

    #[test]
    fn test_any_business_slot_window() {
        let window = ConstraintSpec::AnyBusinessSlot.resolve_window(now(), BusinessHours::default());
        assert_eq!(
            window.start,
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 25).unwrap())
        );
        assert_eq!(
            window.end,
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap())
        );
    }

    #[test]
    fn test_named_weekday_today_before_close() {
        // Now is Monday 11:00, constraint Monday: still today.
        let window = ConstraintSpec::NamedWeekday(Weekday::Mon)
            .resolve_window(now(), BusinessHours::default());
        assert_eq!(
            window.start,
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap())
        );
    }

    #[test]
    fn test_named_weekday_today_after_close_advances_a_week() {
        let late = timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(), 19, 0);
        let window = ConstraintSpec::NamedWeekday(Weekday::Mon)
            .resolve_window(late, BusinessHours::default());
        assert_eq!(
            window.start,
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 31).unwrap())
        );
    }

    #[test]
    fn test_named_weekday_earlier_in_week_wraps() {
        // Now is Monday; "Sunday" already passed this week -> next Sunday.
        let window = ConstraintSpec::NamedWeekday(Weekday::Sun)
            .resolve_window(now(), BusinessHours::default());
        assert_eq!(
            window.start,
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 30).unwrap())
        );
    }

    #[test]
    fn test_tomorrow_window_is_single_day() {
        let window = ConstraintSpec::RelativeDay { offset_days: 1 }
            .resolve_window(now(), BusinessHours::default());
        assert_eq!(window.duration_minutes(), 24 * 60);
        assert_eq!(
            window.start,
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 25).unwrap())
        );
    }

    #[test]
    fn test_anchor_only_for_explicit_time() {
        let spec = ConstraintSpec::NamedWeekdayWithTime {
            weekday: Weekday::Thu,
            hour: 14,
            minute: 30,
        };
        assert_eq!(spec.anchor_hour_minute(), Some((14, 30)));
        assert_eq!(
            ConstraintSpec::NamedWeekday(Weekday::Thu).anchor_hour_minute(),
            None
        );
    }
}
