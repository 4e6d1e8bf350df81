//! Scheduling policies.
//!
//! Normal priority avoids conflicts: advisor suggestion (re-validated)
//! first, then earliest common free slot, then the deterministic
//! low-confidence fallback. High priority targets the earliest
//! plausible slot directly and displaces whatever collides with it.

mod displace;

pub use displace::{ConflictResolver, Relocation, RelocationPlan};

use chrono::{DateTime, Duration, FixedOffset};
use log::{info, warn};

use crate::advisor::{summarize_calendars, RankingAdvisor};
use crate::calendar::{CalendarSnapshot, Event};
use crate::config::EngineConfig;
use crate::constraint::ConstraintSpec;
use crate::interval::{common_free_slots, Interval};
use crate::request::{CandidateSlot, MeetingRequest, Priority, SchedulingMethod, SearchStrategy};
use crate::timefmt;

/// The result of one policy invocation: the chosen slot plus the
/// "after" snapshot with relocations applied and the new meeting
/// appended to every participant.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub slot: CandidateSlot,
    pub method: SchedulingMethod,
    pub relocations: Vec<Relocation>,
    pub unmovable: Vec<Event>,
    pub low_confidence: bool,
    pub after: CalendarSnapshot,
    pub meeting_event_id: String,
}

/// Chooses a candidate slot for a request against a snapshot.
pub struct SchedulingPolicy<'a> {
    config: &'a EngineConfig,
    advisor: Option<&'a dyn RankingAdvisor>,
}

impl<'a> SchedulingPolicy<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: &'a dyn RankingAdvisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Run the policy for `request` against `snapshot`. The snapshot is
    /// cloned into the outcome's "after" state; the original is never
    /// modified.
    pub fn schedule(
        &self,
        request: &MeetingRequest,
        snapshot: &CalendarSnapshot,
        now: DateTime<FixedOffset>,
        strategy: SearchStrategy,
    ) -> ScheduleOutcome {
        match request.priority {
            Priority::High => self.schedule_high(request, snapshot, now),
            Priority::Normal => self.schedule_normal(request, snapshot, now, strategy),
        }
    }

    fn schedule_normal(
        &self,
        request: &MeetingRequest,
        snapshot: &CalendarSnapshot,
        now: DateTime<FixedOffset>,
        strategy: SearchStrategy,
    ) -> ScheduleOutcome {
        let hours = self.config.business_hours;
        let window = request.constraint.resolve_window(now, hours);
        let duration = Duration::minutes(request.duration_minutes);

        if strategy == SearchStrategy::AdvisorAssisted {
            if let Some(advisor) = self.advisor {
                let summary = summarize_calendars(snapshot);
                if let Some(suggested) = advisor.suggest(request, &summary, now) {
                    if self.advisor_slot_acceptable(&suggested, request, snapshot, now) {
                        info!("accepted advisor slot at {}", timefmt::format_ts(suggested.start));
                        return self.finish(
                            request,
                            snapshot,
                            suggested,
                            SchedulingMethod::AdvisorSuggestion,
                            RelocationPlan::default(),
                            false,
                        );
                    }
                    warn!("advisor slot rejected by conflict re-validation");
                }
            }
        }

        let busy = snapshot.busy_intervals();
        let slots = common_free_slots(&busy, window, duration, hours);
        if let Some(first) = slots.into_iter().find(|slot| slot.start > now) {
            let slot = CandidateSlot {
                start: first.start,
                end: first.end,
                reasoning: format!("earliest common free slot for '{}'", request.constraint),
                displaced_count: 0,
            };
            return self.finish(
                request,
                snapshot,
                slot,
                SchedulingMethod::CommonSlotSearch,
                RelocationPlan::default(),
                false,
            );
        }

        // Not guaranteed conflict-free; flagged low confidence.
        let fallback = self.fallback_slot(now, duration);
        warn!(
            "no common free slot; falling back to {}",
            timefmt::format_ts(fallback.start)
        );
        let slot = CandidateSlot {
            start: fallback.start,
            end: fallback.end,
            reasoning: "no common free slot found; low-confidence default slot".to_string(),
            displaced_count: 0,
        };
        self.finish(
            request,
            snapshot,
            slot,
            SchedulingMethod::DefaultFallback,
            RelocationPlan::default(),
            true,
        )
    }

    fn schedule_high(
        &self,
        request: &MeetingRequest,
        snapshot: &CalendarSnapshot,
        now: DateTime<FixedOffset>,
    ) -> ScheduleOutcome {
        let hours = self.config.business_hours;
        let preferred = self.preferred_slot(&request.constraint, request.duration_minutes, now);

        let conflicts = ConflictResolver::conflicting_events(snapshot, preferred);
        let plan = if conflicts.is_empty() {
            RelocationPlan::default()
        } else {
            info!(
                "high priority slot collides with {} events; attempting displacement",
                conflicts.len()
            );
            ConflictResolver::new(hours).resolve(snapshot, preferred)
        };

        let reasoning = if plan.relocations.is_empty() && plan.unmovable.is_empty() {
            "preferred slot was already free".to_string()
        } else {
            format!(
                "displaced {} events ({} could not be moved)",
                plan.relocations.len(),
                plan.unmovable.len()
            )
        };
        let slot = CandidateSlot {
            start: preferred.start,
            end: preferred.end,
            reasoning,
            displaced_count: plan.relocations.len(),
        };
        let low_confidence = !plan.unmovable.is_empty();
        self.finish(
            request,
            snapshot,
            slot,
            SchedulingMethod::PriorityDisplacement,
            plan,
            low_confidence,
        )
    }

    /// The earliest plausible slot for a high-priority request: the
    /// constraint's named time when it has one, otherwise the
    /// business-hours opening of the resolved day.
    fn preferred_slot(
        &self,
        constraint: &ConstraintSpec,
        duration_minutes: i64,
        now: DateTime<FixedOffset>,
    ) -> Interval {
        let hours = self.config.business_hours;
        let window = constraint.resolve_window(now, hours);

        let mut date = window.start.date_naive();
        while !hours.is_weekday(date) {
            date += Duration::days(1);
        }

        let (hour, minute) = constraint
            .anchor_hour_minute()
            .unwrap_or((hours.start_hour, 0));
        let start = timefmt::at_hm(date, hour, minute);
        Interval {
            start,
            end: start + Duration::minutes(duration_minutes),
        }
    }

    /// Advisor slots are accepted only when conflict-free for every
    /// participant, strictly in the future, and duration-exact.
    fn advisor_slot_acceptable(
        &self,
        slot: &CandidateSlot,
        request: &MeetingRequest,
        snapshot: &CalendarSnapshot,
        now: DateTime<FixedOffset>,
    ) -> bool {
        if slot.start <= now {
            return false;
        }
        if slot.duration_minutes() != request.duration_minutes {
            return false;
        }
        let interval = slot.interval();
        for participant in request.all_participants() {
            for event in snapshot.events_for(&participant) {
                if event.interval().overlaps(&interval) {
                    return false;
                }
            }
        }
        true
    }

    /// Deterministic default: the next weekday at the configured
    /// fallback hour.
    fn fallback_slot(&self, now: DateTime<FixedOffset>, duration: Duration) -> Interval {
        let hours = self.config.business_hours;
        let mut date = now.date_naive() + Duration::days(1);
        while !hours.is_weekday(date) {
            date += Duration::days(1);
        }
        let start = timefmt::at_hm(date, self.config.fallback_hour, 0);
        Interval {
            start,
            end: start + duration,
        }
    }

    /// Apply relocations and append the meeting to every participant's
    /// calendar in a working copy.
    fn finish(
        &self,
        request: &MeetingRequest,
        snapshot: &CalendarSnapshot,
        slot: CandidateSlot,
        method: SchedulingMethod,
        plan: RelocationPlan,
        low_confidence: bool,
    ) -> ScheduleOutcome {
        let mut after = snapshot.clone();
        plan.apply(&mut after);

        let meeting_event_id = format!("meeting-{}", request.request_id);
        let participants = request.all_participants();
        if let Ok(meeting) = Event::new(
            meeting_event_id.clone(),
            slot.start,
            slot.end,
            participants.clone(),
            request.topic.clone(),
        ) {
            for participant in &participants {
                after.add_event(participant, meeting.clone());
            }
        }

        ScheduleOutcome {
            slot,
            method,
            relocations: plan.relocations,
            unmovable: plan.unmovable,
            low_confidence,
            after,
            meeting_event_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Priority;
    use chrono::{NaiveDate, Weekday};

    // Monday 2026-08-24, 11:00
    fn now() -> DateTime<FixedOffset> {
        timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(), 11, 0)
    }

    fn window() -> Interval {
        Interval::new(
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()),
            timefmt::midnight(NaiveDate::from_ymd_opt(2026, 9, 7).unwrap()),
        )
        .unwrap()
    }

    fn request(constraint: ConstraintSpec, priority: Priority) -> MeetingRequest {
        MeetingRequest {
            request_id: "req-1".into(),
            organizer: "org@example.com".into(),
            participants: vec!["a@example.com".into()],
            duration_minutes: 30,
            constraint,
            priority,
            topic: "Planning".into(),
        }
    }

    fn empty_snapshot() -> CalendarSnapshot {
        let mut snap = CalendarSnapshot::new(window());
        snap.insert("org@example.com".into(), Vec::new());
        snap.insert("a@example.com".into(), Vec::new());
        snap
    }

    #[test]
    fn test_normal_picks_earliest_common_slot() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        let req = request(ConstraintSpec::RelativeDay { offset_days: 1 }, Priority::Normal);

        let outcome = policy.schedule(&req, &empty_snapshot(), now(), SearchStrategy::Algorithmic);

        assert_eq!(outcome.method, SchedulingMethod::CommonSlotSearch);
        assert_eq!(outcome.slot.duration_minutes(), 30);
        // Tuesday at business open.
        assert_eq!(
            outcome.slot.start,
            timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(), 9, 0)
        );
        assert!(!outcome.low_confidence);
    }

    #[test]
    fn test_normal_avoids_busy_participant() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        // Wednesday 2026-08-26, B busy 10:00-11:30.
        let wednesday = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let mut snap = empty_snapshot();
        snap.insert(
            "a@example.com".into(),
            vec![Event::new(
                "busy",
                timefmt::at_hm(wednesday, 10, 0),
                timefmt::at_hm(wednesday, 11, 30),
                vec!["a@example.com".into()],
                "Busy block",
            )
            .unwrap()],
        );

        let req = request(ConstraintSpec::NamedWeekday(Weekday::Wed), Priority::Normal);
        let outcome = policy.schedule(&req, &snap, now(), SearchStrategy::Algorithmic);

        let busy = Interval::new(
            timefmt::at_hm(wednesday, 10, 0),
            timefmt::at_hm(wednesday, 11, 30),
        )
        .unwrap();
        assert!(!outcome.slot.interval().overlaps(&busy));
        assert_eq!(outcome.slot.start.date_naive(), wednesday);
    }

    #[test]
    fn test_normal_falls_back_when_fully_booked() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let mut snap = empty_snapshot();
        snap.insert(
            "a@example.com".into(),
            vec![Event::new(
                "allday",
                timefmt::at_hm(tuesday, 9, 0),
                timefmt::at_hm(tuesday, 18, 0),
                vec!["a@example.com".into()],
                "Workshop",
            )
            .unwrap()],
        );

        let req = request(ConstraintSpec::RelativeDay { offset_days: 1 }, Priority::Normal);
        let outcome = policy.schedule(&req, &snap, now(), SearchStrategy::Algorithmic);

        assert_eq!(outcome.method, SchedulingMethod::DefaultFallback);
        assert!(outcome.low_confidence);
        // Next weekday at the fallback hour.
        assert_eq!(outcome.slot.start, timefmt::at_hm(tuesday, 10, 0));
    }

    #[test]
    fn test_high_priority_free_slot_needs_no_displacement() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        let req = request(ConstraintSpec::NamedWeekday(Weekday::Tue), Priority::High);

        let outcome = policy.schedule(&req, &empty_snapshot(), now(), SearchStrategy::Algorithmic);

        assert_eq!(outcome.method, SchedulingMethod::PriorityDisplacement);
        assert_eq!(outcome.slot.displaced_count, 0);
        assert_eq!(
            outcome.slot.start,
            timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(), 9, 0)
        );
    }

    #[test]
    fn test_high_priority_anchors_to_named_time() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        let req = request(
            ConstraintSpec::NamedWeekdayWithTime {
                weekday: Weekday::Thu,
                hour: 14,
                minute: 30,
            },
            Priority::High,
        );

        let outcome = policy.schedule(&req, &empty_snapshot(), now(), SearchStrategy::Algorithmic);

        assert_eq!(
            outcome.slot.start,
            timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(), 14, 30)
        );
    }

    #[test]
    fn test_high_priority_displaces_and_updates_after_snapshot() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let mut snap = empty_snapshot();
        let workshop = Event::new(
            "workshop",
            timefmt::at_hm(tuesday, 9, 0),
            timefmt::at_hm(tuesday, 18, 0),
            vec!["org@example.com".into(), "a@example.com".into()],
            "All-day workshop",
        )
        .unwrap();
        snap.insert("org@example.com".into(), vec![workshop.clone()]);
        snap.insert("a@example.com".into(), vec![workshop]);

        let req = request(ConstraintSpec::NamedWeekday(Weekday::Tue), Priority::High);
        let outcome = policy.schedule(&req, &snap, now(), SearchStrategy::Algorithmic);

        assert!(outcome.slot.displaced_count >= 1);
        assert_eq!(outcome.slot.start, timefmt::at_hm(tuesday, 9, 0));
        assert_eq!(outcome.slot.end, timefmt::at_hm(tuesday, 9, 30));

        // After-snapshot holds the meeting and no residual conflicts.
        assert!(outcome.after.conflicts().is_empty());
        for p in ["org@example.com", "a@example.com"] {
            assert!(outcome
                .after
                .events_for(p)
                .iter()
                .any(|e| e.id == outcome.meeting_event_id));
        }
    }

    struct FixedAdvisor(CandidateSlot);

    impl RankingAdvisor for FixedAdvisor {
        fn suggest(
            &self,
            _request: &MeetingRequest,
            _calendar_summary: &str,
            _now: DateTime<FixedOffset>,
        ) -> Option<CandidateSlot> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn test_advisor_slot_revalidated_before_acceptance() {
        let config = EngineConfig::default();
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();

        // Advisor proposes a slot colliding with an existing event.
        let bad = CandidateSlot {
            start: timefmt::at_hm(tuesday, 10, 0),
            end: timefmt::at_hm(tuesday, 10, 30),
            reasoning: "advisor pick".into(),
            displaced_count: 0,
        };
        let advisor = FixedAdvisor(bad);
        let policy = SchedulingPolicy::new(&config).with_advisor(&advisor);

        let mut snap = empty_snapshot();
        snap.insert(
            "a@example.com".into(),
            vec![Event::new(
                "clash",
                timefmt::at_hm(tuesday, 10, 0),
                timefmt::at_hm(tuesday, 11, 0),
                vec!["a@example.com".into()],
                "Existing",
            )
            .unwrap()],
        );

        let req = request(ConstraintSpec::RelativeDay { offset_days: 1 }, Priority::Normal);
        let outcome = policy.schedule(&req, &snap, now(), SearchStrategy::AdvisorAssisted);

        // Fell through to algorithmic search.
        assert_eq!(outcome.method, SchedulingMethod::CommonSlotSearch);
        assert!(!outcome.slot.interval().overlaps(
            &Interval::new(timefmt::at_hm(tuesday, 10, 0), timefmt::at_hm(tuesday, 11, 0)).unwrap()
        ));
    }

    #[test]
    fn test_advisor_slot_accepted_when_clean() {
        let config = EngineConfig::default();
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let good = CandidateSlot {
            start: timefmt::at_hm(tuesday, 15, 0),
            end: timefmt::at_hm(tuesday, 15, 30),
            reasoning: "afternoon works for everyone".into(),
            displaced_count: 0,
        };
        let advisor = FixedAdvisor(good);
        let policy = SchedulingPolicy::new(&config).with_advisor(&advisor);

        let req = request(ConstraintSpec::RelativeDay { offset_days: 1 }, Priority::Normal);
        let outcome = policy.schedule(&req, &empty_snapshot(), now(), SearchStrategy::AdvisorAssisted);

        assert_eq!(outcome.method, SchedulingMethod::AdvisorSuggestion);
        assert_eq!(outcome.slot.start, timefmt::at_hm(tuesday, 15, 0));
    }
}
