use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Deserialize;

use meetslot_core::parser::MeetingParser;
use meetslot_core::{
    EngineConfig, FixtureProvider, HeuristicParser, LlmAdvisor, MeetingRequest, MeetingScheduler,
    Priority,
};

#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to the request JSON file
    #[arg(long)]
    pub request: PathBuf,
    /// Path to a fixture calendars JSON file
    #[arg(long)]
    pub calendars: Option<PathBuf>,
    /// Override "now" (YYYY-MM-DDTHH:MM:SS+05:30), for reproducible runs
    #[arg(long)]
    pub now: Option<String>,
    /// Base URL of a completions-style ranking advisor
    #[arg(long)]
    pub advisor_url: Option<String>,
    /// Advisor model name
    #[arg(long, default_value = "default")]
    pub advisor_model: String,
}

/// Incoming request record as the front end sends it.
#[derive(Debug, Deserialize)]
struct RequestFile {
    #[serde(rename = "Request_id")]
    request_id: String,
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "Attendees", default)]
    attendees: Vec<AttendeeRef>,
    #[serde(rename = "Subject", default)]
    subject: String,
    #[serde(rename = "EmailContent", default)]
    email_content: String,
}

#[derive(Debug, Deserialize)]
struct AttendeeRef {
    email: String,
}

pub fn run(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.request)?;
    let file: RequestFile = serde_json::from_str(&text)?;

    // Duration, day constraint, and priority come out of the free text.
    let parsed = HeuristicParser::new().parse(&file.email_content);

    let mut participants: Vec<String> = file.attendees.into_iter().map(|a| a.email).collect();
    for email in &parsed.mentioned_participants {
        if !participants.contains(email) && *email != file.from {
            participants.push(email.clone());
        }
    }

    let request = MeetingRequest {
        request_id: file.request_id,
        organizer: file.from,
        participants,
        duration_minutes: parsed.duration_minutes,
        constraint: parsed.constraint,
        priority: parsed.priority,
        topic: if file.subject.is_empty() {
            "Meeting".to_string()
        } else {
            file.subject
        },
    };
    log::info!(
        "scheduling '{}' ({} priority, {} minutes, {})",
        request.topic,
        if request.priority == Priority::High { "high" } else { "normal" },
        request.duration_minutes,
        request.constraint
    );

    let provider = match &args.calendars {
        Some(path) => FixtureProvider::from_json_file(path)?,
        None => FixtureProvider::new(),
    };

    let config = EngineConfig::load()?;
    let mut scheduler = MeetingScheduler::new(config, Arc::new(provider));
    if let Some(url) = &args.advisor_url {
        scheduler = scheduler.with_advisor(Arc::new(LlmAdvisor::new(url, &args.advisor_model)));
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let response = match &args.now {
        Some(now) => {
            let now = meetslot_core::timefmt::parse_ts(now)?;
            runtime.block_on(scheduler.schedule_at(&request, now))?
        }
        None => runtime.block_on(scheduler.schedule(&request))?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
