//! In-memory calendar provider backed by fixture data.
//!
//! Used by the CLI (loading calendars from a JSON file) and by tests.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use super::CalendarProvider;
use crate::calendar::{Event, ParticipantId};
use crate::error::ProviderError;
use crate::interval::Interval;
use crate::timefmt;

/// Fixture file shape: participant email -> event records with boundary
/// timestamp strings.
#[derive(Debug, Deserialize)]
struct FixtureEvent {
    #[serde(rename = "StartTime")]
    start_time: String,
    #[serde(rename = "EndTime")]
    end_time: String,
    #[serde(rename = "Attendees", default)]
    attendees: Vec<String>,
    #[serde(rename = "Summary", default)]
    summary: String,
}

/// Static calendars keyed by participant.
#[derive(Default)]
pub struct FixtureProvider {
    calendars: HashMap<ParticipantId, Vec<Event>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(mut self, participant: &str, events: Vec<Event>) -> Self {
        self.calendars.insert(participant.to_string(), events);
        self
    }

    /// Load fixture calendars from a JSON file of the form
    /// `{"user@example.com": [{"StartTime": ..., "EndTime": ...}, ...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ProviderError> {
        let raw: HashMap<String, Vec<FixtureEvent>> =
            serde_json::from_str(text).map_err(|e| ProviderError::Decode(e.to_string()))?;

        let mut calendars = HashMap::new();
        for (participant, raw_events) in raw {
            let mut events = Vec::with_capacity(raw_events.len());
            for raw_event in raw_events {
                let start = timefmt::parse_ts(&raw_event.start_time)
                    .map_err(|e| ProviderError::Decode(e.to_string()))?;
                let end = timefmt::parse_ts(&raw_event.end_time)
                    .map_err(|e| ProviderError::Decode(e.to_string()))?;
                let attendees = if raw_event.attendees.is_empty() {
                    vec![participant.clone()]
                } else {
                    raw_event.attendees
                };
                let event = Event::new(
                    Uuid::new_v4().to_string(),
                    start,
                    end,
                    attendees,
                    raw_event.summary,
                )
                .map_err(|e| ProviderError::Decode(e.to_string()))?;
                events.push(event);
            }
            calendars.insert(participant, events);
        }
        Ok(Self { calendars })
    }
}

impl CalendarProvider for FixtureProvider {
    fn list_events(
        &self,
        participant: &str,
        window: Interval,
    ) -> Result<Vec<Event>, ProviderError> {
        let events = self
            .calendars
            .get(participant)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.interval().overlaps(&window))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }
}
