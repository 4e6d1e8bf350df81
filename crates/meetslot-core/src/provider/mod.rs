//! Calendar provider capability contract.
//!
//! Providers hand the engine each participant's events for a window.
//! Any provider error means "no data for this participant" to the
//! engine, never a fatal request error.

mod fixture;
mod google;

pub use fixture::FixtureProvider;
pub use google::GoogleCalendarProvider;

use crate::calendar::Event;
use crate::error::ProviderError;
use crate::interval::Interval;

/// Read access to one participant's calendar.
///
/// Implementations may block; the snapshot builder always calls them
/// from a blocking task behind the fetch semaphore.
pub trait CalendarProvider: Send + Sync {
    fn list_events(&self, participant: &str, window: Interval)
        -> Result<Vec<Event>, ProviderError>;
}
