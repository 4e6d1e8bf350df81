//! Request orchestration.
//!
//! One `MeetingScheduler` serves many requests; each request gets its
//! own snapshot, validation loop, and response, with no shared mutable
//! state beyond the snapshot cache. The validation loop runs on a
//! blocking worker; a panic anywhere inside it degrades to the
//! emergency fallback response rather than an error.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use log::{error, info};

use crate::advisor::RankingAdvisor;
use crate::calendar::SnapshotBuilder;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::interval::Interval;
use crate::policy::SchedulingPolicy;
use crate::provider::CalendarProvider;
use crate::request::MeetingRequest;
use crate::response::ScheduleResponse;
use crate::timefmt;
use crate::validate::ValidationLoop;

pub struct MeetingScheduler {
    config: EngineConfig,
    builder: SnapshotBuilder,
    advisor: Option<Arc<dyn RankingAdvisor>>,
}

impl MeetingScheduler {
    pub fn new(config: EngineConfig, provider: Arc<dyn CalendarProvider>) -> Self {
        let builder = SnapshotBuilder::new(
            provider,
            config.cache_ttl(),
            config.max_concurrent_fetches,
            config.fetch_timeout(),
        );
        Self {
            config,
            builder,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn RankingAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Schedule relative to the current wall clock.
    pub async fn schedule(&self, request: &MeetingRequest) -> Result<ScheduleResponse> {
        self.schedule_at(request, timefmt::now()).await
    }

    /// Schedule relative to an explicit "now". Input validation errors
    /// are returned; everything downstream degrades into one of the
    /// fallback tiers instead of failing.
    pub async fn schedule_at(
        &self,
        request: &MeetingRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<ScheduleResponse> {
        request.validate(
            self.config.min_duration_minutes,
            self.config.max_duration_minutes,
        )?;

        let window = self.fetch_window(request, now);
        let participants = request.all_participants();
        let snapshot = self.builder.fetch(&participants, window).await;
        snapshot.log_summary("fetched calendars", self.config.business_hours);

        let config = self.config.clone();
        let advisor = self.advisor.clone();
        let req = request.clone();
        let attempt = tokio::task::spawn_blocking(move || {
            let mut policy = SchedulingPolicy::new(&config);
            if let Some(advisor) = advisor.as_deref() {
                policy = policy.with_advisor(advisor);
            }
            ValidationLoop::new(&config, policy).run(&req, &snapshot, now)
        })
        .await;

        match attempt {
            Ok(validated) => {
                info!(
                    "request {} scheduled at {} (score {:.1}, {} iterations)",
                    request.request_id,
                    timefmt::format_ts(validated.outcome.slot.start),
                    validated.report.score,
                    validated.iterations_used
                );
                Ok(ScheduleResponse::from_validated(request, &validated))
            }
            Err(join_err) => {
                error!(
                    "scheduling pipeline panicked for {}: {}",
                    request.request_id, join_err
                );
                Ok(ScheduleResponse::emergency(request, now, &self.config))
            }
        }
    }

    /// Wide enough for the resolved constraint window plus the forward
    /// displacement search.
    fn fetch_window(&self, request: &MeetingRequest, now: DateTime<FixedOffset>) -> Interval {
        let resolved = request
            .constraint
            .resolve_window(now, self.config.business_hours);
        let start = timefmt::midnight(now.date_naive()).min(resolved.start);
        let end = resolved.end.max(timefmt::midnight(now.date_naive()) + Duration::days(14));
        Interval { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Event;
    use crate::constraint::ConstraintSpec;
    use crate::error::CoreError;
    use crate::provider::FixtureProvider;
    use crate::request::{CandidateSlot, Priority, SchedulingMethod};
    use crate::response::OutcomeTier;
    use chrono::NaiveDate;

    fn now() -> DateTime<FixedOffset> {
        timefmt::at_hm(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(), 11, 0)
    }

    fn request(priority: Priority) -> MeetingRequest {
        MeetingRequest {
            request_id: "req-1".into(),
            organizer: "org@example.com".into(),
            participants: vec!["a@example.com".into()],
            duration_minutes: 30,
            constraint: ConstraintSpec::RelativeDay { offset_days: 1 },
            priority,
            topic: "Sync".into(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_end_to_end() {
        let scheduler = MeetingScheduler::new(
            EngineConfig::default(),
            Arc::new(FixtureProvider::new()),
        );
        let response = scheduler.schedule_at(&request(Priority::Normal), now()).await.unwrap();

        assert_eq!(response.duration_minutes, 30);
        assert_eq!(response.metadata.outcome_tier, OutcomeTier::Perfect);
        assert_eq!(response.metadata.iterations_used, 1);
        // The new meeting shows up on both calendars.
        for attendee in &response.attendees {
            assert!(attendee.events.iter().any(|e| e.summary == "Sync"));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_duration_rejected_before_scheduling() {
        let scheduler = MeetingScheduler::new(
            EngineConfig::default(),
            Arc::new(FixtureProvider::new()),
        );
        let mut req = request(Priority::Normal);
        req.duration_minutes = 5;

        let result = scheduler.schedule_at(&req, now()).await;
        assert!(matches!(result, Err(CoreError::InvalidRequest(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_high_priority_displaces_busy_day() {
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let workshop = Event::new(
            "workshop",
            timefmt::at_hm(tuesday, 9, 0),
            timefmt::at_hm(tuesday, 18, 0),
            vec!["org@example.com".into(), "a@example.com".into()],
            "Workshop",
        )
        .unwrap();
        let provider = FixtureProvider::new()
            .with_calendar("org@example.com", vec![workshop.clone()])
            .with_calendar("a@example.com", vec![workshop]);

        let scheduler = MeetingScheduler::new(EngineConfig::default(), Arc::new(provider));
        let response = scheduler.schedule_at(&request(Priority::High), now()).await.unwrap();

        assert_eq!(response.metadata.scheduling_method, SchedulingMethod::PriorityDisplacement);
        assert!(response.metadata.displaced_count >= 1);
        assert_eq!(response.event_start, "2026-08-25T09:00:00+05:30");
        assert_eq!(response.event_end, "2026-08-25T09:30:00+05:30");
    }

    struct PanickingAdvisor;

    impl RankingAdvisor for PanickingAdvisor {
        fn suggest(
            &self,
            _request: &MeetingRequest,
            _calendar_summary: &str,
            _now: DateTime<FixedOffset>,
        ) -> Option<CandidateSlot> {
            panic!("advisor blew up");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_panic_degrades_to_emergency() {
        let scheduler = MeetingScheduler::new(
            EngineConfig::default(),
            Arc::new(FixtureProvider::new()),
        )
        .with_advisor(Arc::new(PanickingAdvisor));

        let response = scheduler.schedule_at(&request(Priority::Normal), now()).await.unwrap();

        assert!(response.metadata.emergency_fallback);
        assert_eq!(response.metadata.outcome_tier, OutcomeTier::Emergency);
        assert_eq!(response.event_start, "2026-08-25T10:00:00+05:30");
    }
}
