use std::path::PathBuf;

use chrono::Duration;
use clap::Args;

use meetslot_core::interval::free_slots;
use meetslot_core::provider::CalendarProvider;
use meetslot_core::{EngineConfig, FixtureProvider, Interval};

#[derive(Args)]
pub struct SlotsArgs {
    /// Path to a fixture calendars JSON file
    #[arg(long)]
    pub calendars: PathBuf,
    /// Participant email to analyze; omit for all in the file
    #[arg(long)]
    pub participant: Vec<String>,
    /// First day of the analysis window (YYYY-MM-DD); defaults to tomorrow
    #[arg(long)]
    pub from: Option<String>,
    /// Number of days to analyze
    #[arg(long, default_value_t = 7)]
    pub days: i64,
    /// Slot duration in minutes
    #[arg(long, default_value_t = 30)]
    pub duration: i64,
}

pub fn run(args: SlotsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let provider = FixtureProvider::from_json_file(&args.calendars)?;
    let config = EngineConfig::load()?;
    let hours = config.business_hours;

    let start_date = match &args.from {
        Some(text) => text.parse()?,
        None => meetslot_core::timefmt::now().date_naive() + Duration::days(1),
    };
    let window = Interval::new(
        meetslot_core::timefmt::midnight(start_date),
        meetslot_core::timefmt::midnight(start_date + Duration::days(args.days)),
    )
    .ok_or("analysis window is empty")?;

    let participants = if args.participant.is_empty() {
        let text = std::fs::read_to_string(&args.calendars)?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        raw.as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    } else {
        args.participant.clone()
    };

    for participant in &participants {
        let events = provider.list_events(participant, window)?;
        let busy: Vec<Interval> = events.iter().map(|e| e.interval()).collect();
        let off_hours = events.iter().filter(|e| hours.is_off_hours(e.start)).count();

        let slots = free_slots(&busy, window, Duration::minutes(args.duration), hours);

        println!("{}:", participant);
        println!(
            "  {} events ({} off-hours), {} free {}-minute slots",
            events.len(),
            off_hours,
            slots.len(),
            args.duration
        );
        for slot in slots.iter().take(10) {
            println!(
                "  free {} -> {}",
                meetslot_core::timefmt::format_ts(slot.start),
                meetslot_core::timefmt::format_ts(slot.end)
            );
        }
        if slots.len() > 10 {
            println!("  ... {} more", slots.len() - 10);
        }
    }
    Ok(())
}
