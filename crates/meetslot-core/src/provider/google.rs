//! Google Calendar provider.
//!
//! Reads each participant's primary calendar through the Calendar v3
//! events API with a bearer token supplied by the caller. Malformed
//! items in a response are skipped with a warning rather than failing
//! the whole calendar.

use log::warn;
use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::CalendarProvider;
use crate::calendar::Event;
use crate::error::ProviderError;
use crate::interval::Interval;
use crate::timefmt;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Calendar v3 client with an injected access token. Token acquisition
/// and refresh live outside the engine.
pub struct GoogleCalendarProvider {
    base_url: String,
    access_token: String,
    client: Client,
}

impl GoogleCalendarProvider {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            client: Client::new(),
        }
    }

    /// Point the provider at a different API host. Used in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self, participant: &str, window: Interval) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/calendars/{}/events", self.base_url, participant))
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("timeMin", &window.start.to_rfc3339())
            .append_pair("timeMax", &window.end.to_rfc3339())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");
        Ok(url)
    }

    fn parse_item(item: &serde_json::Value, participant: &str) -> Option<Event> {
        let start_str = item["start"]["dateTime"]
            .as_str()
            .or_else(|| item["start"]["date"].as_str())?;
        let end_str = item["end"]["dateTime"]
            .as_str()
            .or_else(|| item["end"]["date"].as_str())?;

        let start = timefmt::parse_ts(start_str).ok()?.with_timezone(&timefmt::offset());
        let end = timefmt::parse_ts(end_str).ok()?.with_timezone(&timefmt::offset());

        let id = item["id"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let summary = item["summary"].as_str().unwrap_or("(No title)");

        let mut attendees: Vec<String> = item["attendees"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|a| a["email"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if attendees.is_empty() {
            attendees.push(participant.to_string());
        }

        Event::new(id, start, end, attendees, summary).ok()
    }
}

impl CalendarProvider for GoogleCalendarProvider {
    fn list_events(
        &self,
        participant: &str,
        window: Interval,
    ) -> Result<Vec<Event>, ProviderError> {
        let url = self.events_url(participant, window)?;
        let client = self.client.clone();
        let token = self.access_token.clone();

        let resp: serde_json::Value = tokio::runtime::Handle::current().block_on(async move {
            client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await?
                .json()
                .await
        })?;

        if let Some(err) = resp.get("error") {
            let code = err["code"].as_i64().unwrap_or(0);
            if code == 401 || code == 403 {
                return Err(ProviderError::NotAuthorized {
                    participant: participant.to_string(),
                });
            }
            return Err(ProviderError::Http(format!("Calendar API error: {err}")));
        }

        let items = resp["items"]
            .as_array()
            .ok_or_else(|| ProviderError::Decode("missing items in response".to_string()))?;

        let mut events = Vec::with_capacity(items.len());
        for item in items {
            match Self::parse_item(item, participant) {
                Some(event) => events.push(event),
                None => warn!(
                    "skipping malformed calendar item for {}: {}",
                    participant, item
                ),
            }
        }
        Ok(events)
    }
}
