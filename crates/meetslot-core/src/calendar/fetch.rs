//! Concurrent calendar fetching.
//!
//! Fetching the N participant calendars is the only suspending step of
//! a scheduling request. Fetches run concurrently behind a bounded
//! semaphore with a per-fetch timeout; a failed or timed-out fetch
//! degrades that participant to an empty calendar instead of aborting
//! the request.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{CalendarSnapshot, Event, ParticipantId, SnapshotCache};
use crate::interval::Interval;
use crate::provider::CalendarProvider;

/// Builds calendar snapshots from a provider, with a read-through cache
/// and bounded fetch concurrency.
pub struct SnapshotBuilder {
    provider: Arc<dyn CalendarProvider>,
    cache: Arc<SnapshotCache>,
    max_concurrent: usize,
    fetch_timeout: Duration,
}

impl SnapshotBuilder {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        cache_ttl: Duration,
        max_concurrent: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache: Arc::new(SnapshotCache::new(cache_ttl)),
            max_concurrent: max_concurrent.max(1),
            fetch_timeout,
        }
    }

    /// Fetch every participant's events for `window` into a snapshot.
    /// Individual failures are logged and degrade to empty calendars.
    pub async fn fetch(&self, participants: &[ParticipantId], window: Interval) -> CalendarSnapshot {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles: Vec<JoinHandle<(ParticipantId, Vec<Event>)>> = Vec::new();

        for participant in participants {
            if let Some(events) = self.cache.get(participant, window) {
                info!("using cached events for {}", participant);
                let participant = participant.clone();
                handles.push(tokio::spawn(async move { (participant, events) }));
                continue;
            }

            let provider = Arc::clone(&self.provider);
            let cache = Arc::clone(&self.cache);
            let semaphore = Arc::clone(&semaphore);
            let fetch_timeout = self.fetch_timeout;
            let participant = participant.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (participant, Vec::new()),
                };

                let fetch_for = participant.clone();
                let fetch = tokio::task::spawn_blocking(move || {
                    provider.list_events(&fetch_for, window)
                });

                // Only genuine provider answers are cached; a degraded
                // (failed or timed-out) fetch must retry next request.
                let events = match timeout(fetch_timeout, fetch).await {
                    Ok(Ok(Ok(events))) => {
                        cache.put(&participant, window, events.clone());
                        events
                    }
                    Ok(Ok(Err(err))) => {
                        warn!("calendar fetch failed for {}: {}", participant, err);
                        Vec::new()
                    }
                    Ok(Err(join_err)) => {
                        warn!("calendar fetch task failed for {}: {}", participant, join_err);
                        Vec::new()
                    }
                    Err(_) => {
                        warn!("calendar fetch timed out for {}", participant);
                        Vec::new()
                    }
                };
                (participant, events)
            }));
        }

        let mut snapshot = CalendarSnapshot::new(window);
        for handle in handles {
            match handle.await {
                Ok((participant, events)) => snapshot.insert(participant, events),
                Err(join_err) => warn!("fetch task panicked: {}", join_err),
            }
        }
        snapshot
    }
}
