//! Ranking advisor: an optional external collaborator that proposes a
//! candidate slot from a calendar summary.
//!
//! The advisor's free-text output is recovered through an ordered list
//! of JSON extraction strategies; the first one that parses wins. The
//! engine never trusts an advisor slot: the scheduling policy
//! re-validates it against every participant's calendar before
//! acceptance.

use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::calendar::CalendarSnapshot;
use crate::request::{CandidateSlot, MeetingRequest};
use crate::timefmt;

/// Proposes a slot for a request given a summary of everyone's
/// calendar. Returning `None` is always acceptable; the policy falls
/// through to algorithmic search.
pub trait RankingAdvisor: Send + Sync {
    fn suggest(
        &self,
        request: &MeetingRequest,
        calendar_summary: &str,
        now: DateTime<FixedOffset>,
    ) -> Option<CandidateSlot>;
}

/// One-line-per-event summary fed to the advisor.
pub fn summarize_calendars(snapshot: &CalendarSnapshot) -> String {
    let mut lines = Vec::new();
    for participant in snapshot.participants() {
        let events = snapshot.events_for(participant);
        if events.is_empty() {
            lines.push(format!("{}: no events", participant));
            continue;
        }
        for event in events {
            lines.push(format!(
                "{}: {} -> {} ({})",
                participant,
                timefmt::format_ts(event.start),
                timefmt::format_ts(event.end),
                event.summary
            ));
        }
    }
    lines.join("\n")
}

/// Recover a JSON object from free-form advisor text. Strategies are
/// tried in order; the first that parses wins.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let strategies: &[fn(&str) -> Option<&str>] =
        &[balanced_braces, after_json_marker, last_line];
    for strategy in strategies {
        if let Some(candidate) = strategy(text) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// First balanced `{...}` region in the text.
fn balanced_braces(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[open..open + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Everything after a literal `JSON:` marker.
fn after_json_marker(text: &str) -> Option<&str> {
    let idx = text.find("JSON:")?;
    Some(text[idx + "JSON:".len()..].trim())
}

/// The last non-empty line.
fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

#[derive(Debug, Deserialize)]
struct AdvisorSuggestion {
    start: String,
    end: String,
    #[serde(default)]
    reasoning: String,
}

fn candidate_from_json(value: &serde_json::Value) -> Option<CandidateSlot> {
    let suggestion: AdvisorSuggestion = serde_json::from_value(value.clone()).ok()?;
    let start = timefmt::parse_ts(&suggestion.start).ok()?;
    let end = timefmt::parse_ts(&suggestion.end).ok()?;
    if start >= end {
        return None;
    }
    Some(CandidateSlot {
        start,
        end,
        reasoning: if suggestion.reasoning.is_empty() {
            "advisor suggestion".to_string()
        } else {
            suggestion.reasoning
        },
        displaced_count: 0,
    })
}

/// HTTP-backed advisor speaking a completions-style API. Any transport
/// or parse failure degrades to `None`.
pub struct LlmAdvisor {
    base_url: String,
    model: String,
    client: Client,
}

impl LlmAdvisor {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: Client::new(),
        }
    }

    fn prompt(request: &MeetingRequest, calendar_summary: &str, now: DateTime<FixedOffset>) -> String {
        format!(
            "Current time: {}\nMeeting: '{}' for {} minutes, constraint: {}, participants: {}\nCalendars:\n{}\n\
             Reply with a JSON object: {{\"start\": \"...\", \"end\": \"...\", \"reasoning\": \"...\"}} \
             using {} timestamps.",
            timefmt::format_ts(now),
            request.topic,
            request.duration_minutes,
            request.constraint,
            request.all_participants().join(", "),
            calendar_summary,
            "YYYY-MM-DDTHH:MM:SS+05:30",
        )
    }

    fn complete(&self, prompt: String) -> Result<String, reqwest::Error> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": 256,
            "temperature": 0.0,
        });
        let url = format!("{}/v1/completions", self.base_url);
        let client = self.client.clone();

        let resp: serde_json::Value = tokio::runtime::Handle::current().block_on(async move {
            client.post(&url).json(&body).send().await?.json().await
        })?;

        Ok(resp["choices"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

impl RankingAdvisor for LlmAdvisor {
    fn suggest(
        &self,
        request: &MeetingRequest,
        calendar_summary: &str,
        now: DateTime<FixedOffset>,
    ) -> Option<CandidateSlot> {
        let prompt = Self::prompt(request, calendar_summary, now);
        let text = match self.complete(prompt) {
            Ok(text) => text,
            Err(err) => {
                warn!("advisor request failed, skipping: {}", err);
                return None;
            }
        };

        let value = extract_json(&text)?;
        let candidate = candidate_from_json(&value);
        if candidate.is_none() {
            debug!("advisor output had no usable slot: {}", text);
        }
        candidate
    }
}
