//! Calendar snapshot store.
//!
//! An in-memory view of each participant's events for a fixed window.
//! Snapshots are pure data: the validation loop works on independent
//! deep copies (`Clone`) per attempt so corrections never corrupt the
//! original. The only mutation path is event relocation during
//! high-priority displacement, which is explicit and logged.

mod cache;
mod fetch;

pub use cache::SnapshotCache;
pub use fetch::SnapshotBuilder;

use chrono::{DateTime, FixedOffset};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::RequestError;
use crate::interval::{BusinessHours, Interval};
use crate::timefmt;

/// Participants are identified by email address.
pub type ParticipantId = String;

/// A calendar event. `start < end` is enforced at construction; the
/// interval is rewritten only by the conflict resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub attendees: Vec<ParticipantId>,
    pub summary: String,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        attendees: Vec<ParticipantId>,
        summary: impl Into<String>,
    ) -> Result<Self, RequestError> {
        if start >= end {
            return Err(RequestError::InvalidTimeRange {
                start: timefmt::format_ts(start),
                end: timefmt::format_ts(end),
            });
        }
        Ok(Self {
            id: id.into(),
            start,
            end,
            attendees,
            summary: summary.into(),
        })
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Per-participant event lists for one scheduling window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSnapshot {
    pub window: Interval,
    events: BTreeMap<ParticipantId, Vec<Event>>,
}

impl CalendarSnapshot {
    pub fn new(window: Interval) -> Self {
        Self {
            window,
            events: BTreeMap::new(),
        }
    }

    /// Insert a participant's events, kept sorted by start time.
    pub fn insert(&mut self, participant: ParticipantId, mut events: Vec<Event>) {
        events.sort_by_key(|e| e.start);
        self.events.insert(participant, events);
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.events.keys()
    }

    pub fn events_for(&self, participant: &str) -> &[Event] {
        self.events.get(participant).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn event_count(&self, participant: &str) -> usize {
        self.events_for(participant).len()
    }

    /// Busy intervals per participant, for free-slot search.
    pub fn busy_intervals(&self) -> BTreeMap<ParticipantId, Vec<Interval>> {
        self.events
            .iter()
            .map(|(p, events)| (p.clone(), events.iter().map(Event::interval).collect()))
            .collect()
    }

    /// Append an event to one participant's calendar, keeping order.
    pub fn add_event(&mut self, participant: &str, event: Event) {
        let list = self.events.entry(participant.to_string()).or_default();
        list.push(event);
        list.sort_by_key(|e| e.start);
    }

    /// Rewrite the times of an event everywhere it appears. This is the
    /// explicit mutation used to apply a relocation plan.
    pub fn move_event(
        &mut self,
        event_id: &str,
        new_start: DateTime<FixedOffset>,
        new_end: DateTime<FixedOffset>,
    ) {
        for (participant, events) in self.events.iter_mut() {
            for event in events.iter_mut() {
                if event.id == event_id {
                    info!(
                        "relocating '{}' for {}: {} -> {}",
                        event.summary,
                        participant,
                        timefmt::format_ts(event.start),
                        timefmt::format_ts(new_start)
                    );
                    event.start = new_start;
                    event.end = new_end;
                }
            }
            events.sort_by_key(|e| e.start);
        }
    }

    /// All pairs of overlapping events per participant. Empty means a
    /// conflict-free calendar.
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut found = Vec::new();
        for (participant, events) in &self.events {
            for (i, a) in events.iter().enumerate() {
                for b in &events[i + 1..] {
                    if a.interval().overlaps(&b.interval()) {
                        found.push(Conflict {
                            participant: participant.clone(),
                            first: a.summary.clone(),
                            second: b.summary.clone(),
                        });
                    }
                }
            }
        }
        found
    }

    /// Aggregate counts for snapshot logging.
    pub fn stats(&self, hours: BusinessHours) -> SnapshotStats {
        let mut stats = SnapshotStats {
            participants: self.events.len(),
            ..SnapshotStats::default()
        };
        for events in self.events.values() {
            for event in events {
                stats.total_events += 1;
                if hours.is_off_hours(event.start) {
                    stats.off_hours_events += 1;
                } else {
                    stats.business_hours_events += 1;
                }
            }
        }
        stats
    }

    pub fn log_summary(&self, label: &str, hours: BusinessHours) {
        let stats = self.stats(hours);
        info!(
            "{}: {} participants, {} events ({} business hours, {} off hours)",
            label,
            stats.participants,
            stats.total_events,
            stats.business_hours_events,
            stats.off_hours_events
        );
    }
}

/// A detected overlap between two events of the same participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub participant: ParticipantId,
    pub first: String,
    pub second: String,
}

/// Snapshot-level event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub participants: usize,
    pub total_events: usize,
    pub business_hours_events: usize,
    pub off_hours_events: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    fn window() -> Interval {
        Interval::new(
            timefmt::midnight(monday()),
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()),
        )
        .unwrap()
    }

    fn event(id: &str, h1: u32, h2: u32) -> Event {
        Event::new(
            id,
            timefmt::at_hm(monday(), h1, 0),
            timefmt::at_hm(monday(), h2, 0),
            vec!["a@example.com".into()],
            format!("Event {}", id),
        )
        .unwrap()
    }

    #[test]
    fn test_event_rejects_inverted_range() {
        let start = timefmt::at_hm(monday(), 11, 0);
        let end = timefmt::at_hm(monday(), 10, 0);
        assert!(Event::new("x", start, end, vec![], "bad").is_err());
        assert!(Event::new("x", start, start, vec![], "empty").is_err());
    }

    #[test]
    fn test_insert_sorts_by_start() {
        let mut snap = CalendarSnapshot::new(window());
        snap.insert(
            "a@example.com".into(),
            vec![event("late", 14, 15), event("early", 9, 10)],
        );
        let events = snap.events_for("a@example.com");
        assert_eq!(events[0].id, "early");
        assert_eq!(events[1].id, "late");
    }

    #[test]
    fn test_clone_is_deep() {
        let mut snap = CalendarSnapshot::new(window());
        snap.insert("a@example.com".into(), vec![event("e1", 9, 10)]);

        let mut copy = snap.clone();
        copy.move_event(
            "e1",
            timefmt::at_hm(monday(), 11, 0),
            timefmt::at_hm(monday(), 12, 0),
        );

        assert_eq!(snap.events_for("a@example.com")[0].start, timefmt::at_hm(monday(), 9, 0));
        assert_eq!(copy.events_for("a@example.com")[0].start, timefmt::at_hm(monday(), 11, 0));
    }

    #[test]
    fn test_move_event_applies_everywhere() {
        let mut snap = CalendarSnapshot::new(window());
        let shared = Event::new(
            "shared",
            timefmt::at_hm(monday(), 9, 0),
            timefmt::at_hm(monday(), 10, 0),
            vec!["a@example.com".into(), "b@example.com".into()],
            "Standup",
        )
        .unwrap();
        snap.insert("a@example.com".into(), vec![shared.clone()]);
        snap.insert("b@example.com".into(), vec![shared]);

        snap.move_event(
            "shared",
            timefmt::at_hm(monday(), 15, 0),
            timefmt::at_hm(monday(), 16, 0),
        );

        for p in ["a@example.com", "b@example.com"] {
            assert_eq!(snap.events_for(p)[0].start, timefmt::at_hm(monday(), 15, 0));
        }
    }

    #[test]
    fn test_conflicts_detected_per_participant() {
        let mut snap = CalendarSnapshot::new(window());
        snap.insert(
            "a@example.com".into(),
            vec![event("e1", 9, 11), event("e2", 10, 12)],
        );
        snap.insert("b@example.com".into(), vec![event("e3", 9, 10)]);

        let conflicts = snap.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].participant, "a@example.com");
    }

    #[test]
    fn test_stats_classify_off_hours() {
        let mut snap = CalendarSnapshot::new(window());
        snap.insert(
            "a@example.com".into(),
            vec![event("biz", 10, 11), event("night", 20, 21)],
        );

        let stats = snap.stats(BusinessHours::default());
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.business_hours_events, 1);
        assert_eq!(stats.off_hours_events, 1);
    }
}
