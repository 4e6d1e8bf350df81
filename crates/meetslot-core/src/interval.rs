//! Half-open time intervals and free/busy slot search.
//!
//! `Interval::overlaps` is the single source of truth for conflict
//! detection everywhere in the engine: two half-open intervals overlap
//! iff `a.start < b.end && a.end > b.start`, so touching endpoints do
//! not conflict.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::calendar::ParticipantId;
use crate::timefmt;

/// Step between candidate slot starts within a gap.
pub const SLOT_STEP_MINUTES: i64 = 30;

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Interval {
    /// Create an interval. Returns `None` unless `start < end`.
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Half-open overlap test. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Whether `instant` falls inside `[start, end)`.
    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// The configured daily window during which meetings are preferred,
/// weekdays only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 18,
        }
    }
}

impl BusinessHours {
    /// Off-hours classification, used for observability only: an instant
    /// is off-hours iff it is before opening, at/after closing, or on a
    /// weekend.
    pub fn is_off_hours(&self, instant: DateTime<FixedOffset>) -> bool {
        let weekend = matches!(instant.weekday(), Weekday::Sat | Weekday::Sun);
        instant.hour() < self.start_hour || instant.hour() >= self.end_hour || weekend
    }

    pub fn is_weekday(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// The business-hours window for one day, or `None` on weekends.
    pub fn day_window(&self, date: NaiveDate) -> Option<Interval> {
        if !self.is_weekday(date) {
            return None;
        }
        Interval::new(
            timefmt::at_hm(date, self.start_hour, 0),
            timefmt::at_hm(date, self.end_hour, 0),
        )
    }
}

/// Find free slots for one busy list within `window`, clipped to
/// business hours on weekdays.
///
/// Busy intervals are sorted by start and the gaps between them are
/// walked per day. Each gap long enough for `duration` yields
/// duration-length slots starting at the earliest business-hours
/// compliant point of the gap and stepping every 30 minutes, so slot
/// boundaries line up across participants.
pub fn free_slots(
    busy: &[Interval],
    window: Interval,
    duration: Duration,
    hours: BusinessHours,
) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = busy.to_vec();
    sorted.sort_by_key(|iv| iv.start);

    let mut slots = Vec::new();
    let mut date = window.start.date_naive();
    let last_date = window.end.date_naive();

    while date <= last_date {
        if let Some(day) = hours.day_window(date) {
            // Clip the business day to the requested window.
            let day_start = day.start.max(window.start);
            let day_end = day.end.min(window.end);
            if let Some(day) = Interval::new(day_start, day_end) {
                emit_day_slots(&sorted, day, duration, &mut slots);
            }
        }
        date += Duration::days(1);
    }

    slots
}

/// Walk the gaps between busy intervals inside one business day.
fn emit_day_slots(busy: &[Interval], day: Interval, duration: Duration, out: &mut Vec<Interval>) {
    let mut cursor = day.start;

    for iv in busy {
        if iv.end <= cursor {
            continue;
        }
        if iv.start >= day.end {
            break;
        }
        if iv.start > cursor {
            emit_gap_slots(cursor, iv.start.min(day.end), duration, out);
        }
        cursor = cursor.max(iv.end);
        if cursor >= day.end {
            return;
        }
    }

    if cursor < day.end {
        emit_gap_slots(cursor, day.end, duration, out);
    }
}

/// Emit duration-length slots inside one gap at 30-minute steps.
fn emit_gap_slots(
    gap_start: DateTime<FixedOffset>,
    gap_end: DateTime<FixedOffset>,
    duration: Duration,
    out: &mut Vec<Interval>,
) {
    let mut start = gap_start;
    while start + duration <= gap_end {
        if let Some(slot) = Interval::new(start, start + duration) {
            out.push(slot);
        }
        start += Duration::minutes(SLOT_STEP_MINUTES);
    }
}

/// Free slots common to every participant: per-participant `free_slots`
/// intersected as sets of identical `(start, end)` pairs, ascending.
/// Empty if any participant has no free slots at all.
pub fn common_free_slots(
    per_participant: &BTreeMap<ParticipantId, Vec<Interval>>,
    window: Interval,
    duration: Duration,
    hours: BusinessHours,
) -> Vec<Interval> {
    let mut common: Option<BTreeSet<Interval>> = None;

    for busy in per_participant.values() {
        let slots: BTreeSet<Interval> =
            free_slots(busy, window, duration, hours).into_iter().collect();
        if slots.is_empty() {
            return Vec::new();
        }
        common = Some(match common {
            None => slots,
            Some(acc) => acc.intersection(&slots).copied().collect(),
        });
    }

    common.map(|set| set.into_iter().collect()).unwrap_or_default()
}
