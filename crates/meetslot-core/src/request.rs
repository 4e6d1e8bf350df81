//! Meeting request and candidate slot types.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::calendar::ParticipantId;
use crate::constraint::ConstraintSpec;
use crate::error::RequestError;
use crate::interval::Interval;

/// Request priority. High priority may displace existing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// How the accepted slot was found. Recorded in response metadata so
/// callers can tell the fallback tiers apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMethod {
    AdvisorSuggestion,
    CommonSlotSearch,
    PriorityDisplacement,
    DefaultFallback,
    EmergencyFallback,
}

/// Whether an attempt may consult the ranking advisor. Corrections
/// switch to pure-algorithmic search after a conflict failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    #[default]
    AdvisorAssisted,
    Algorithmic,
}

/// A validated scheduling request. Built from the external parser's
/// output; the validation loop mutates copies between attempts, never
/// the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub request_id: String,
    pub organizer: ParticipantId,
    pub participants: Vec<ParticipantId>,
    pub duration_minutes: i64,
    pub constraint: ConstraintSpec,
    pub priority: Priority,
    pub topic: String,
}

impl MeetingRequest {
    /// Organizer plus attendees, deduplicated, organizer first.
    pub fn all_participants(&self) -> Vec<ParticipantId> {
        let mut all = vec![self.organizer.clone()];
        for p in &self.participants {
            if !all.contains(p) {
                all.push(p.clone());
            }
        }
        all
    }

    /// Reject malformed requests before any scheduling is attempted.
    pub fn validate(&self, min_duration: i64, max_duration: i64) -> Result<(), RequestError> {
        if self.request_id.is_empty() {
            return Err(RequestError::MissingField("request_id"));
        }
        if self.organizer.is_empty() {
            return Err(RequestError::MissingField("organizer"));
        }
        if self.all_participants().is_empty() {
            return Err(RequestError::NoParticipants);
        }
        if self.duration_minutes < min_duration || self.duration_minutes > max_duration {
            return Err(RequestError::DurationOutOfRange {
                minutes: self.duration_minutes,
                min: min_duration,
                max: max_duration,
            });
        }
        Ok(())
    }
}

/// The engine's proposed answer for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub reasoning: String,
    pub displaced_count: usize,
}

impl CandidateSlot {
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
