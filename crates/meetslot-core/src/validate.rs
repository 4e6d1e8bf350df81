//! Iterative scheduling validation.
//!
//! Each attempt runs the scheduling policy on a fresh copy of the
//! original snapshot, scores the result against a fixed checklist, and
//! either accepts it or derives parameter corrections for the next
//! attempt. Only request parameters drift between attempts; calendar
//! state never does.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarSnapshot;
use crate::config::{EngineConfig, ValidationConfig};
use crate::constraint::ConstraintSpec;
use crate::policy::{ScheduleOutcome, SchedulingPolicy};
use crate::request::{MeetingRequest, Priority, SearchStrategy};
use crate::timefmt;

/// The fixed checklist run against every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    MeetingPresent,
    TimeConstraints,
    DurationCorrect,
    NoResidualConflicts,
    OutputFormat,
    FutureScheduling,
    AttendeeCoverage,
    PriorityHandling,
}

impl CheckName {
    pub const ALL: [CheckName; 8] = [
        CheckName::MeetingPresent,
        CheckName::TimeConstraints,
        CheckName::DurationCorrect,
        CheckName::NoResidualConflicts,
        CheckName::OutputFormat,
        CheckName::FutureScheduling,
        CheckName::AttendeeCoverage,
        CheckName::PriorityHandling,
    ];

    /// Time- and format-related checks carry the heavier penalty.
    pub fn is_critical(&self) -> bool {
        matches!(self, CheckName::TimeConstraints | CheckName::OutputFormat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Scored checklist for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: BTreeMap<CheckName, CheckResult>,
    pub score: f64,
}

impl ValidationReport {
    pub fn failed_checks(&self) -> impl Iterator<Item = CheckName> + '_ {
        self.checks
            .iter()
            .filter(|(_, result)| !result.passed)
            .map(|(name, _)| *name)
    }

    pub fn check_failed(&self, name: CheckName) -> bool {
        self.checks.get(&name).is_some_and(|r| !r.passed)
    }
}

/// Pure scoring: base percentage of passed checks, minus the extra
/// penalty per failed check, floored at zero.
pub fn score_checks(
    checks: &BTreeMap<CheckName, CheckResult>,
    config: &ValidationConfig,
) -> f64 {
    let total = checks.len().max(1) as f64;
    let passed = checks.values().filter(|r| r.passed).count() as f64;
    let mut score = 100.0 * passed / total;
    for (name, result) in checks {
        if !result.passed {
            score -= if name.is_critical() {
                config.critical_penalty
            } else {
                config.minor_penalty
            };
        }
    }
    score.max(0.0)
}

/// Run the checklist against one attempt. Pure in all inputs: scoring
/// the same state twice yields the same report.
pub fn evaluate(
    before: &CalendarSnapshot,
    outcome: &ScheduleOutcome,
    request: &MeetingRequest,
    now: DateTime<FixedOffset>,
    config: &EngineConfig,
) -> ValidationReport {
    let mut checks = BTreeMap::new();
    let slot = &outcome.slot;
    let participants = request.all_participants();

    let missing: Vec<&String> = participants
        .iter()
        .filter(|p| {
            !outcome
                .after
                .events_for(p)
                .iter()
                .any(|e| e.id == outcome.meeting_event_id)
        })
        .collect();
    checks.insert(
        CheckName::MeetingPresent,
        if missing.is_empty() {
            CheckResult::pass("meeting present on every calendar")
        } else {
            CheckResult::fail(format!("meeting missing for {} participants", missing.len()))
        },
    );

    let window = request.constraint.resolve_window(now, config.business_hours);
    checks.insert(
        CheckName::TimeConstraints,
        if window.contains(slot.start) {
            CheckResult::pass(format!("slot within window for '{}'", request.constraint))
        } else {
            CheckResult::fail(format!(
                "slot {} outside resolved window",
                timefmt::format_ts(slot.start)
            ))
        },
    );

    let deviation = (slot.duration_minutes() - request.duration_minutes).abs();
    checks.insert(
        CheckName::DurationCorrect,
        if deviation <= config.validation.duration_tolerance_minutes {
            CheckResult::pass("duration within tolerance")
        } else {
            CheckResult::fail(format!(
                "duration off by {} minutes",
                deviation
            ))
        },
    );

    let residual = outcome.after.conflicts();
    checks.insert(
        CheckName::NoResidualConflicts,
        if residual.is_empty() {
            CheckResult::pass("no overlapping events remain")
        } else {
            CheckResult::fail(format!("{} residual conflicts", residual.len()))
        },
    );

    let start_str = timefmt::format_ts(slot.start);
    let end_str = timefmt::format_ts(slot.end);
    let shape_ok = timefmt::parse_ts(&start_str).is_ok()
        && timefmt::parse_ts(&end_str).is_ok()
        && !request.request_id.is_empty()
        && !participants.is_empty();
    checks.insert(
        CheckName::OutputFormat,
        if shape_ok {
            CheckResult::pass("output record is well formed")
        } else {
            CheckResult::fail("output record is missing required fields")
        },
    );

    checks.insert(
        CheckName::FutureScheduling,
        if slot.start > now {
            CheckResult::pass("slot is in the future")
        } else {
            CheckResult::fail(format!("slot {} is not after now", start_str))
        },
    );

    let attendee_ok = participants.iter().all(|p| {
        outcome
            .after
            .events_for(p)
            .iter()
            .find(|e| e.id == outcome.meeting_event_id)
            .is_some_and(|e| {
                participants.iter().all(|q| e.attendees.contains(q))
            })
    });
    checks.insert(
        CheckName::AttendeeCoverage,
        if attendee_ok {
            CheckResult::pass("attendee set matches the request")
        } else {
            CheckResult::fail("meeting attendees do not match the request")
        },
    );

    let priority_ok = match request.priority {
        Priority::Normal => true,
        Priority::High => {
            let had_conflicts = before
                .busy_intervals()
                .values()
                .flatten()
                .any(|iv| iv.overlaps(&slot.interval()));
            let displacement_ok = !had_conflicts || slot.displaced_count >= 1
                || !outcome.unmovable.is_empty();
            let anchor_ok = match request.constraint.anchor_hour_minute() {
                Some((hour, minute)) => {
                    use chrono::Timelike;
                    slot.start.hour() == hour && slot.start.minute() == minute
                }
                None => true,
            };
            displacement_ok && anchor_ok
        }
    };
    checks.insert(
        CheckName::PriorityHandling,
        if priority_ok {
            CheckResult::pass("priority semantics honored")
        } else {
            CheckResult::fail("high priority request did not displace or anchor correctly")
        },
    );

    let score = score_checks(&checks, &config.validation);
    ValidationReport { checks, score }
}

/// The final product of the loop: the best attempt with its report.
#[derive(Debug, Clone)]
pub struct ValidatedSchedule {
    pub outcome: ScheduleOutcome,
    pub report: ValidationReport,
    /// The (possibly corrected) request parameters of this attempt.
    pub request_used: MeetingRequest,
    pub iterations_used: usize,
    pub accepted: bool,
}

/// Runs attempts until a result scores at or above the acceptance
/// threshold or the retry budget is exhausted, keeping the best.
pub struct ValidationLoop<'a> {
    config: &'a EngineConfig,
    policy: SchedulingPolicy<'a>,
}

impl<'a> ValidationLoop<'a> {
    pub fn new(config: &'a EngineConfig, policy: SchedulingPolicy<'a>) -> Self {
        Self { config, policy }
    }

    pub fn run(
        &self,
        request: &MeetingRequest,
        before: &CalendarSnapshot,
        now: DateTime<FixedOffset>,
    ) -> ValidatedSchedule {
        let mut current = request.clone();
        let mut strategy = SearchStrategy::default();
        let mut best: Option<ValidatedSchedule> = None;

        for attempt in 1..=self.config.validation.max_attempts {
            // Every attempt derives its after-state from a fresh copy of
            // the original snapshot; the original is never touched.
            let outcome = self.policy.schedule(&current, before, now, strategy);
            let report = evaluate(before, &outcome, &current, now, self.config);
            info!(
                "attempt {}: score {:.1} via {:?}",
                attempt, report.score, outcome.method
            );

            let accepted = report.score >= self.config.validation.accept_threshold;
            let result = ValidatedSchedule {
                outcome,
                report,
                request_used: current.clone(),
                iterations_used: attempt,
                accepted,
            };

            if accepted {
                return result;
            }

            let improves = best
                .as_ref()
                .map(|b| result.report.score > b.report.score)
                .unwrap_or(true);
            let report = result.report.clone();
            if improves {
                best = Some(result);
            }

            self.correct(&mut current, &mut strategy, &report, now);
        }

        // Exhausted. max_attempts >= 1 is enforced at config load, so
        // the first attempt always populated `best`.
        let mut exhausted = best.expect("at least one scheduling attempt ran");
        exhausted.iterations_used = self.config.validation.max_attempts;
        warn!(
            "validation exhausted after {} attempts; best score {:.1}",
            exhausted.iterations_used, exhausted.report.score
        );
        exhausted
    }

    /// Parameter nudges derived from the failed checks.
    fn correct(
        &self,
        request: &mut MeetingRequest,
        strategy: &mut SearchStrategy,
        report: &ValidationReport,
        now: DateTime<FixedOffset>,
    ) {
        if report.check_failed(CheckName::TimeConstraints) {
            let window = request
                .constraint
                .resolve_window(now, self.config.business_hours);
            if request.constraint == ConstraintSpec::AnyBusinessSlot {
                // Pin an unresolved flexible constraint to a concrete day.
                request.constraint = ConstraintSpec::NamedWeekday(self.config.correction_weekday());
            } else {
                // Nothing schedulable remains once the last business day
                // of the window has closed.
                let last_day = window.end.date_naive() - chrono::Duration::days(1);
                let last_close =
                    timefmt::at_hm(last_day, self.config.business_hours.end_hour, 0);
                if last_close <= now {
                    request.constraint = ConstraintSpec::RelativeDay { offset_days: 1 };
                }
            }
        }

        if report.check_failed(CheckName::DurationCorrect) {
            request.duration_minutes = if request.duration_minutes < self.config.min_duration_minutes
            {
                self.config.default_duration_minutes
            } else if request.duration_minutes > 120 {
                60
            } else {
                request.duration_minutes
            };
        }

        if report.check_failed(CheckName::NoResidualConflicts) {
            *strategy = SearchStrategy::Algorithmic;
        }

        if report.check_failed(CheckName::FutureScheduling) {
            request.constraint = ConstraintSpec::RelativeDay { offset_days: 1 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Event;
    use crate::interval::Interval;
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
            topic: "Review".into(),
        }
    }

    fn empty_snapshot() -> CalendarSnapshot {
        let mut snap = CalendarSnapshot::new(window());
        snap.insert("org@example.com".into(), Vec::new());
        snap.insert("a@example.com".into(), Vec::new());
        snap
    }

    #[test]
    fn test_clean_schedule_accepted_first_attempt() {
        let config = EngineConfig::default();
        let validation = ValidationLoop::new(&config, SchedulingPolicy::new(&config));
        let req = request(ConstraintSpec::RelativeDay { offset_days: 1 }, Priority::Normal);

        let result = validation.run(&req, &empty_snapshot(), now());

        assert!(result.accepted);
        assert_eq!(result.iterations_used, 1);
        assert_eq!(result.report.score, 100.0);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let config = EngineConfig::default();
        let policy = SchedulingPolicy::new(&config);
        let req = request(ConstraintSpec::RelativeDay { offset_days: 1 }, Priority::Normal);
        let before = empty_snapshot();

        let outcome = policy.schedule(&req, &before, now(), SearchStrategy::Algorithmic);
        let first = evaluate(&before, &outcome, &req, now(), &config);
        let second = evaluate(&before, &outcome, &req, now(), &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_score_penalties_and_floor() {
        let config = ValidationConfig::default();
        let mut checks = BTreeMap::new();
        for name in CheckName::ALL {
            checks.insert(name, CheckResult::fail("x"));
        }
        // 0 base, penalties push below zero, floored.
        assert_eq!(score_checks(&checks, &config), 0.0);

        let mut checks = BTreeMap::new();
        for name in CheckName::ALL {
            checks.insert(name, CheckResult::pass("ok"));
        }
        assert_eq!(score_checks(&checks, &config), 100.0);

        // One critical failure: 7/8 passed minus 10.
        checks.insert(CheckName::OutputFormat, CheckResult::fail("bad"));
        let score = score_checks(&checks, &config);
        assert!((score - (87.5 - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_past_constraint_corrected_within_budget() {
        let config = EngineConfig::default();
        let validation = ValidationLoop::new(&config, SchedulingPolicy::new(&config));
        // "Today" at 19:00 leaves no business slot in the window: the
        // first attempt falls back outside it and fails the time check.
        let late = timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(), 19, 0);
        let req = request(ConstraintSpec::RelativeDay { offset_days: 0 }, Priority::Normal);

        let result = validation.run(&req, &empty_snapshot(), late);

        // The correction pins the request to tomorrow and converges.
        assert!(result.accepted, "score was {}", result.report.score);
        assert!(result.iterations_used <= config.validation.max_attempts);
        assert!(result.iterations_used > 1);
        assert!(result.outcome.slot.start > late);
        assert_eq!(
            result.request_used.constraint,
            ConstraintSpec::RelativeDay { offset_days: 1 }
        );
    }

    #[test]
    fn test_high_priority_displacement_validates() {
        let config = EngineConfig::default();
        let validation = ValidationLoop::new(&config, SchedulingPolicy::new(&config));

        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let mut snap = empty_snapshot();
        let workshop = Event::new(
            "workshop",
            timefmt::at_hm(tuesday, 9, 0),
            timefmt::at_hm(tuesday, 18, 0),
            vec!["org@example.com".into(), "a@example.com".into()],
            "Workshop",
        )
        .unwrap();
        snap.insert("org@example.com".into(), vec![workshop.clone()]);
        snap.insert("a@example.com".into(), vec![workshop]);

        let req = request(ConstraintSpec::NamedWeekday(Weekday::Tue), Priority::High);
        let result = validation.run(&req, &snap, now());

        assert!(result.accepted, "score was {}", result.report.score);
        assert!(result.outcome.slot.displaced_count >= 1);
        assert!(result.outcome.after.conflicts().is_empty());
    }

    #[test]
    fn test_exhaustion_returns_best_within_budget() {
        let config = EngineConfig::default();
        let validation = ValidationLoop::new(&config, SchedulingPolicy::new(&config));

        // Target day fully booked for a normal-priority request: every
        // attempt lands on the conflicting fallback slot and no
        // correction can help, so the loop must exhaust its budget.
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

        let req = request(ConstraintSpec::NamedWeekday(Weekday::Tue), Priority::Normal);
        let result = validation.run(&req, &snap, now());

        assert!(!result.accepted);
        assert_eq!(result.iterations_used, config.validation.max_attempts);
        assert!(result.report.score < config.validation.accept_threshold);
        // The best attempt still carries a usable slot.
        assert!(result.outcome.slot.start < result.outcome.slot.end);
    }

    #[test]
    fn test_original_snapshot_never_mutated() {
        let config = EngineConfig::default();
        let validation = ValidationLoop::new(&config, SchedulingPolicy::new(&config));

        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let mut snap = empty_snapshot();
        snap.insert(
            "a@example.com".into(),
            vec![Event::new(
                "fixed",
                timefmt::at_hm(tuesday, 9, 0),
                timefmt::at_hm(tuesday, 10, 0),
                vec!["a@example.com".into()],
                "Fixed",
            )
            .unwrap()],
        );

        let req = request(ConstraintSpec::NamedWeekday(Weekday::Tue), Priority::High);
        let _ = validation.run(&req, &snap, now());

        // Before-state untouched by any attempt.
        assert_eq!(snap.events_for("a@example.com").len(), 1);
        assert_eq!(
            snap.events_for("a@example.com")[0].start,
            timefmt::at_hm(tuesday, 9, 0)
        );
    }
}
