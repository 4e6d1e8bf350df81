//! Meeting parameter parsing.
//!
//! Turns the raw request text into structured meeting parameters. The
//! engine never trusts this layer with anything but hints: a parse
//! that finds nothing yields the conservative default (any business
//! slot, 30 minutes, normal priority) rather than an error.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::constraint::ConstraintSpec;
use crate::request::Priority;

/// Structured parameters extracted from free-form request text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMeeting {
    pub duration_minutes: i64,
    pub constraint: ConstraintSpec,
    pub priority: Priority,
    /// Email addresses mentioned in the text body.
    pub mentioned_participants: Vec<String>,
}

impl Default for ParsedMeeting {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            constraint: ConstraintSpec::AnyBusinessSlot,
            priority: Priority::Normal,
            mentioned_participants: Vec::new(),
        }
    }
}

/// Capability contract for request parsing. Implementations must be
/// infallible: on failure, return `ParsedMeeting::default()`.
pub trait MeetingParser: Send + Sync {
    fn parse(&self, raw_text: &str) -> ParsedMeeting;
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
            .expect("hard-coded pattern compiles")
    })
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d+)\s*(minutes?|mins?|hours?|hrs?)\b")
            .expect("hard-coded pattern compiles")
    })
}

const PRIORITY_KEYWORDS: &[&str] = &["urgent", "asap", "critical", "high priority", "important"];

/// Regex-based parser. Deliberately conservative: only explicit
/// mentions of duration, day, time, or urgency change the defaults.
#[derive(Debug, Clone, Default)]
pub struct HeuristicParser {
    default_duration_minutes: Option<i64>,
}

impl HeuristicParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_duration(minutes: i64) -> Self {
        Self {
            default_duration_minutes: Some(minutes),
        }
    }

    fn parse_duration(&self, text: &str) -> Option<i64> {
        let caps = duration_re().captures(text)?;
        let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_ascii_lowercase();
        if unit.starts_with('h') {
            Some(amount * 60)
        } else {
            Some(amount)
        }
    }
}

impl MeetingParser for HeuristicParser {
    fn parse(&self, raw_text: &str) -> ParsedMeeting {
        let lowered = raw_text.to_ascii_lowercase();

        let duration_minutes = self
            .parse_duration(raw_text)
            .or(self.default_duration_minutes)
            .unwrap_or(30);

        let priority = if PRIORITY_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            Priority::High
        } else {
            Priority::Normal
        };

        let mentioned_participants = email_re()
            .find_iter(raw_text)
            .map(|m| m.as_str().to_ascii_lowercase())
            .collect();

        let parsed = ParsedMeeting {
            duration_minutes,
            constraint: ConstraintSpec::parse(raw_text),
            priority,
            mentioned_participants,
        };
        debug!("parsed meeting parameters: {:?}", parsed);
        parsed
    }
}
