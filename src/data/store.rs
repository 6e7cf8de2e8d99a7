//! Event Store seam
//!
//! The core reads timestamped events through this trait and never writes
//! them; logging happens in the application layer. `MemoryEventStore` is
//! the in-process implementation used by tests and embedding callers.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::types::{DateRange, Event, EventKind};

/// Read access to a user's logged events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events of `kind` for the user inside `range`, ordered by timestamp
    ///
    /// `item_id` narrows to a single logged identity when set.
    async fn events(
        &self,
        user_id: &str,
        kind: EventKind,
        item_id: Option<&str>,
        range: &DateRange,
    ) -> Result<Vec<Event>>;
}

/// In-memory event store keyed by user
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<HashMap<String, Vec<Event>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event for a user (application-side write path)
    pub fn push(&self, user_id: &str, event: Event) {
        self.events
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(event);
    }

    pub fn push_all(&self, user_id: &str, events: impl IntoIterator<Item = Event>) {
        let mut map = self.events.lock().unwrap();
        map.entry(user_id.to_string()).or_default().extend(events);
    }

    pub fn event_count(&self, user_id: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .get(user_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn events(
        &self,
        user_id: &str,
        kind: EventKind,
        item_id: Option<&str>,
        range: &DateRange,
    ) -> Result<Vec<Event>> {
        let map = self.events.lock().unwrap();
        let mut matched: Vec<Event> = map
            .get(user_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.kind == kind)
                    .filter(|e| item_id.map_or(true, |id| e.item_id == id))
                    .filter(|e| range.contains(e.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by_key(|e| e.timestamp);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_filters_by_kind_item_and_range() {
        let store = MemoryEventStore::new();
        store.push("u1", Event::new(day(1), EventKind::Food, "coffee"));
        store.push("u1", Event::new(day(2), EventKind::Food, "wine"));
        store.push("u1", Event::new(day(3), EventKind::Symptom, "reflux"));
        store.push("u1", Event::new(day(20), EventKind::Food, "coffee"));
        store.push("u2", Event::new(day(4), EventKind::Food, "coffee"));

        let range = DateRange::new(day(1) - Duration::hours(1), day(10));
        let events = store
            .events("u1", EventKind::Food, Some("coffee"), &range)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_id, "coffee");

        let all_food = store.events("u1", EventKind::Food, None, &range).await.unwrap();
        assert_eq!(all_food.len(), 2);
    }

    #[tokio::test]
    async fn test_ordered_by_timestamp() {
        let store = MemoryEventStore::new();
        store.push("u1", Event::new(day(5), EventKind::Food, "coffee"));
        store.push("u1", Event::new(day(1), EventKind::Food, "coffee"));
        store.push("u1", Event::new(day(3), EventKind::Food, "coffee"));

        let range = DateRange::new(day(1) - Duration::hours(1), day(10));
        let events = store
            .events("u1", EventKind::Food, None, &range)
            .await
            .unwrap();
        let stamps: Vec<_> = events.iter().map(|e| e.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_unknown_user_is_empty() {
        let store = MemoryEventStore::new();
        let range = DateRange::new(day(1), day(10));
        let events = store
            .events("nobody", EventKind::Food, None, &range)
            .await
            .unwrap();
        assert!(events.is_empty());
    }
}
