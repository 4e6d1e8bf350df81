//! Conflict resolution for high-priority scheduling.
//!
//! Finds displacement targets for events colliding with the preferred
//! slot and produces a relocation plan. Conflicts are processed in
//! discovery order; each relocation search sees the relocations
//! already committed earlier in the same pass, so no two displaced
//! events can land on overlapping destinations.

use chrono::{Duration, NaiveDate};
use log::{info, warn};

use crate::calendar::{CalendarSnapshot, Event};
use crate::interval::{BusinessHours, Interval, SLOT_STEP_MINUTES};

/// One displaced event and its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Relocation {
    pub event: Event,
    pub new_start: chrono::DateTime<chrono::FixedOffset>,
    pub new_end: chrono::DateTime<chrono::FixedOffset>,
}

/// Outcome of a displacement pass. Events with no viable destination
/// stay in `unmovable`; that is a partial-failure outcome, not a hard
/// failure.
#[derive(Debug, Clone, Default)]
pub struct RelocationPlan {
    pub relocations: Vec<Relocation>,
    pub unmovable: Vec<Event>,
}

impl RelocationPlan {
    pub fn displaced_count(&self) -> usize {
        self.relocations.len()
    }

    /// Mutate `snapshot` to apply every relocation.
    pub fn apply(&self, snapshot: &mut CalendarSnapshot) {
        for relocation in &self.relocations {
            snapshot.move_event(&relocation.event.id, relocation.new_start, relocation.new_end);
        }
    }
}

/// Searches for displacement targets within business hours, same day
/// first, then up to seven weekdays forward.
pub struct ConflictResolver {
    hours: BusinessHours,
}

impl ConflictResolver {
    pub fn new(hours: BusinessHours) -> Self {
        Self { hours }
    }

    /// Events overlapping `slot`, in participant/event discovery order,
    /// deduplicated by id.
    pub fn conflicting_events(snapshot: &CalendarSnapshot, slot: Interval) -> Vec<Event> {
        let mut seen: Vec<String> = Vec::new();
        let mut conflicts = Vec::new();
        for participant in snapshot.participants() {
            for event in snapshot.events_for(participant) {
                if event.interval().overlaps(&slot) && !seen.contains(&event.id) {
                    seen.push(event.id.clone());
                    conflicts.push(event.clone());
                }
            }
        }
        conflicts
    }

    /// Build a relocation plan freeing `preferred` in `snapshot`.
    ///
    /// The snapshot is not modified; the caller applies the plan to its
    /// working copy.
    pub fn resolve(&self, snapshot: &CalendarSnapshot, preferred: Interval) -> RelocationPlan {
        let conflicts = Self::conflicting_events(snapshot, preferred);
        let mut plan = RelocationPlan::default();

        // Scratch copy that accumulates committed relocations so later
        // searches account for them.
        let mut scratch = snapshot.clone();

        for event in conflicts {
            match self.find_destination(&scratch, &event, preferred) {
                Some(destination) => {
                    info!(
                        "displacing '{}' to {}",
                        event.summary,
                        crate::timefmt::format_ts(destination.start)
                    );
                    scratch.move_event(&event.id, destination.start, destination.end);
                    plan.relocations.push(Relocation {
                        event,
                        new_start: destination.start,
                        new_end: destination.end,
                    });
                }
                None => {
                    warn!(
                        "no destination for '{}'; manual intervention needed",
                        event.summary
                    );
                    plan.unmovable.push(event);
                }
            }
        }
        plan
    }

    /// Same-day search first, then forward up to 7 subsequent weekdays.
    fn find_destination(
        &self,
        snapshot: &CalendarSnapshot,
        event: &Event,
        preferred: Interval,
    ) -> Option<Interval> {
        let duration = Duration::minutes(event.duration_minutes());
        let first_day = preferred.start.date_naive();

        if let Some(slot) = self.search_day(snapshot, event, preferred, first_day, duration) {
            return Some(slot);
        }

        let mut date = first_day;
        let mut weekdays_checked = 0;
        while weekdays_checked < 7 {
            date += Duration::days(1);
            if !self.hours.is_weekday(date) {
                continue;
            }
            weekdays_checked += 1;
            if let Some(slot) = self.search_day(snapshot, event, preferred, date, duration) {
                return Some(slot);
            }
        }
        None
    }

    /// 30-minute-granularity scan of one business day.
    fn search_day(
        &self,
        snapshot: &CalendarSnapshot,
        event: &Event,
        preferred: Interval,
        date: NaiveDate,
        duration: Duration,
    ) -> Option<Interval> {
        let day = self.hours.day_window(date)?;
        let mut start = day.start;
        while start + duration <= day.end {
            if let Some(candidate) = Interval::new(start, start + duration) {
                if !candidate.overlaps(&preferred)
                    && self.free_for_all_attendees(snapshot, event, candidate)
                {
                    return Some(candidate);
                }
            }
            start += Duration::minutes(SLOT_STEP_MINUTES);
        }
        None
    }

    /// Free for every original attendee, ignoring the moving event
    /// itself. Attendees without a calendar in the snapshot are
    /// treated as free.
    fn free_for_all_attendees(
        &self,
        snapshot: &CalendarSnapshot,
        event: &Event,
        candidate: Interval,
    ) -> bool {
        for attendee in &event.attendees {
            for other in snapshot.events_for(attendee) {
                if other.id != event.id && other.interval().overlaps(&candidate) {
                    return false;
                }
            }
        }
        true
    }
}
