//! Read-through TTL cache for fetched calendars.
//!
//! Keyed by `(participant, window)`. Entries may be served stale within
//! their TTL; a miss always falls through to a fresh provider fetch.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{Event, ParticipantId};
use crate::interval::Interval;

struct CacheEntry {
    events: Vec<Event>,
    fetched_at: Instant,
}

/// TTL cache owned by the snapshot builder. Never blocks a request:
/// lookups either hit fresh data or miss.
pub struct SnapshotCache {
    ttl: Duration,
    entries: Mutex<HashMap<(ParticipantId, Interval), CacheEntry>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch cached events if still within TTL. Expired entries are
    /// evicted on access.
    pub fn get(&self, participant: &str, window: Interval) -> Option<Vec<Event>> {
        let key = (participant.to_string(), window);
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(&key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.events.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, participant: &str, window: Interval, events: Vec<Event>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            (participant.to_string(), window),
            CacheEntry {
                events,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
