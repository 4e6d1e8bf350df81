//! # Meetslot Core Library
//!
//! This library provides the scheduling & validation engine behind the
//! meetslot CLI. It assigns a time slot to a proposed meeting given the
//! participants' calendars, the meeting's constraints (duration, target
//! day, priority), and business-hours policy.
//!
//! ## Architecture
//!
//! - **Interval Engine**: half-open overlap test, free-slot search and
//!   common-slot intersection within business hours
//! - **Snapshot Store**: per-request in-memory calendars with a TTL
//!   read-through cache and bounded concurrent fetching
//! - **Scheduling Policy**: conflict-avoiding normal priority and
//!   conflict-displacing high priority
//! - **Validation Loop**: scores each attempt against a fixed checklist
//!   and retries with corrected parameters until accepted
//!
//! ## Key Components
//!
//! - [`MeetingScheduler`]: per-request orchestration
//! - [`SchedulingPolicy`]: candidate slot selection
//! - [`ValidationLoop`]: iterative scorer/corrector
//! - [`CalendarProvider`]: trait for calendar backends

pub mod advisor;
pub mod calendar;
pub mod config;
pub mod constraint;
pub mod error;
pub mod interval;
pub mod parser;
pub mod policy;
pub mod provider;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod timefmt;
pub mod validate;

pub use advisor::{LlmAdvisor, RankingAdvisor};
pub use calendar::{CalendarSnapshot, Event, ParticipantId, SnapshotBuilder, SnapshotCache};
pub use config::{EngineConfig, ValidationConfig};
pub use constraint::ConstraintSpec;
pub use error::{ConfigError, CoreError, ProviderError, RequestError, Result};
pub use interval::{BusinessHours, Interval};
pub use parser::{HeuristicParser, MeetingParser, ParsedMeeting};
pub use policy::{ConflictResolver, RelocationPlan, ScheduleOutcome, SchedulingPolicy};
pub use provider::{CalendarProvider, FixtureProvider, GoogleCalendarProvider};
pub use request::{CandidateSlot, MeetingRequest, Priority, SchedulingMethod};
pub use response::{OutcomeTier, ScheduleResponse};
pub use scheduler::MeetingScheduler;
pub use validate::{ValidatedSchedule, ValidationLoop, ValidationReport};
