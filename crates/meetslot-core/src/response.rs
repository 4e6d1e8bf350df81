//! Response boundary records.
//!
//! The record handed to the front end: original request fields, the
//! chosen slot, every participant's calendar with the new meeting
//! appended, and scheduling metadata. All timestamps at this boundary
//! are `YYYY-MM-DDTHH:MM:SS+05:30` strings.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::calendar::Event;
use crate::config::EngineConfig;
use crate::request::{MeetingRequest, SchedulingMethod};
use crate::timefmt;
use crate::validate::ValidatedSchedule;

/// Which fallback tier produced the response. Lets callers and tests
/// tell "perfect" from "accepted-but-imperfect", "best-effort", and
/// "emergency" apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTier {
    Perfect,
    Accepted,
    BestEffort,
    Emergency,
}

/// An event as rendered at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEvent {
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "EndTime")]
    pub end_time: String,
    #[serde(rename = "NumAttendees")]
    pub num_attendees: usize,
    #[serde(rename = "Attendees")]
    pub attendees: Vec<String>,
    #[serde(rename = "Summary")]
    pub summary: String,
}

impl BoundaryEvent {
    fn from_event(event: &Event) -> Self {
        Self {
            start_time: timefmt::format_ts(event.start),
            end_time: timefmt::format_ts(event.end),
            num_attendees: event.attendees.len(),
            attendees: event.attendees.clone(),
            summary: event.summary.clone(),
        }
    }
}

/// One participant's calendar at the boundary, new meeting included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeEvents {
    pub email: String,
    pub events: Vec<BoundaryEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub scheduling_method: SchedulingMethod,
    pub iterations_used: usize,
    pub validation_score: f64,
    pub outcome_tier: OutcomeTier,
    pub displaced_count: usize,
    pub emergency_fallback: bool,
    pub reasoning: String,
}

/// The full boundary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    #[serde(rename = "Request_id")]
    pub request_id: String,
    #[serde(rename = "From")]
    pub organizer: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Attendees")]
    pub attendees: Vec<AttendeeEvents>,
    #[serde(rename = "EventStart")]
    pub event_start: String,
    #[serde(rename = "EventEnd")]
    pub event_end: String,
    #[serde(rename = "DurationMinutes")]
    pub duration_minutes: i64,
    #[serde(rename = "MetaData")]
    pub metadata: ResponseMetadata,
}

impl ScheduleResponse {
    /// Render a validated schedule. The per-participant event lists come
    /// from the after-snapshot, so they include applied relocations and
    /// the new meeting.
    pub fn from_validated(request: &MeetingRequest, validated: &ValidatedSchedule) -> Self {
        let tier = if validated.accepted {
            if validated.report.score >= 100.0 {
                OutcomeTier::Perfect
            } else {
                OutcomeTier::Accepted
            }
        } else {
            OutcomeTier::BestEffort
        };

        let attendees = request
            .all_participants()
            .into_iter()
            .map(|email| {
                let events = validated
                    .outcome
                    .after
                    .events_for(&email)
                    .iter()
                    .map(BoundaryEvent::from_event)
                    .collect();
                AttendeeEvents { email, events }
            })
            .collect();

        let slot = &validated.outcome.slot;
        Self {
            request_id: request.request_id.clone(),
            organizer: request.organizer.clone(),
            subject: request.topic.clone(),
            attendees,
            event_start: timefmt::format_ts(slot.start),
            event_end: timefmt::format_ts(slot.end),
            duration_minutes: slot.duration_minutes(),
            metadata: ResponseMetadata {
                scheduling_method: validated.outcome.method,
                iterations_used: validated.iterations_used,
                validation_score: validated.report.score,
                outcome_tier: tier,
                displaced_count: slot.displaced_count,
                emergency_fallback: false,
                reasoning: slot.reasoning.clone(),
            },
        }
    }

    /// The catastrophic-tier response: tomorrow's next weekday at the
    /// default hour for the default duration, attendee calendars left
    /// empty.
    pub fn emergency(
        request: &MeetingRequest,
        now: DateTime<FixedOffset>,
        config: &EngineConfig,
    ) -> Self {
        let hours = config.business_hours;
        let mut date = now.date_naive() + Duration::days(1);
        while !hours.is_weekday(date) {
            date += Duration::days(1);
        }
        let start = timefmt::at_hm(date, config.fallback_hour, 0);
        let end = start + Duration::minutes(config.default_duration_minutes);

        let attendees = request
            .all_participants()
            .into_iter()
            .map(|email| AttendeeEvents {
                email,
                events: Vec::new(),
            })
            .collect();

        Self {
            request_id: request.request_id.clone(),
            organizer: request.organizer.clone(),
            subject: request.topic.clone(),
            attendees,
            event_start: timefmt::format_ts(start),
            event_end: timefmt::format_ts(end),
            duration_minutes: config.default_duration_minutes,
            metadata: ResponseMetadata {
                scheduling_method: SchedulingMethod::EmergencyFallback,
                iterations_used: 0,
                validation_score: 0.0,
                outcome_tier: OutcomeTier::Emergency,
                displaced_count: 0,
                emergency_fallback: true,
                reasoning: "pipeline failure; emergency fallback slot".to_string(),
            },
        }
    }
}
