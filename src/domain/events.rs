//! Realtime event frames and the bounded display log.

use std::collections::VecDeque;

use serde_json::{Map, Value};
use sonoscope_api_types::EventMessage;
use time::OffsetDateTime;
use time::macros::format_description;

pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 8;

/// One decoded server-pushed event. Immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    id: u64,
    event_type: String,
    payload: Map<String, Value>,
    created_at: OffsetDateTime,
}

impl StreamEvent {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Display line in the form `<type> @ <HH:MM:SS>`.
    pub fn summary(&self) -> String {
        let clock = format_description!("[hour]:[minute]:[second]");
        let stamp = self
            .created_at
            .format(&clock)
            .unwrap_or_else(|_| self.created_at.to_string());
        format!("{} @ {stamp}", self.event_type)
    }
}

impl From<EventMessage> for StreamEvent {
    fn from(message: EventMessage) -> Self {
        Self {
            id: message.id,
            event_type: message.event_type,
            payload: message.payload,
            created_at: message.created_at,
        }
    }
}

/// Newest-first list of event summaries with a fixed capacity.
///
/// Order is arrival order, not `created_at` order; the oldest entry is
/// evicted once capacity is exceeded.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// A zero capacity is bumped to one so the log always shows something.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn record(&mut self, event: &StreamEvent) {
        self.push(event.summary());
    }

    /// Record a free-form line, e.g. a stream error, through the same bound.
    pub fn record_notice(&mut self, notice: impl Into<String>) {
        self.push(notice.into());
    }

    fn push(&mut self, line: String) {
        self.entries.push_front(line);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn event(id: u64, at: OffsetDateTime) -> StreamEvent {
        StreamEvent::from(EventMessage {
            id,
            event_type: format!("evt-{id}"),
            payload: Map::new(),
            created_at: at,
        })
    }

    #[test]
    fn summary_uses_wall_clock_time() {
        let evt = event(3, datetime!(2024-05-01 09:07:05 UTC));
        assert_eq!(evt.summary(), "evt-3 @ 09:07:05");
    }

    #[test]
    fn keeps_eight_newest_of_twenty() {
        let base = datetime!(2024-05-01 09:00 UTC);
        let mut log = EventLog::default();
        for id in 1..=20 {
            log.record(&event(id, base + Duration::seconds(id as i64)));
        }

        assert_eq!(log.len(), 8);
        let types: Vec<String> = log
            .entries()
            .map(|line| line.split(' ').next().unwrap_or_default().to_string())
            .collect();
        let expected: Vec<String> = (13..=20).rev().map(|id| format!("evt-{id}")).collect();
        assert_eq!(types, expected);
    }

    #[test]
    fn order_follows_arrival_not_timestamp() {
        let base = datetime!(2024-05-01 09:00 UTC);
        let mut log = EventLog::new(4);
        log.record(&event(1, base + Duration::minutes(10)));
        log.record(&event(2, base));

        let first = log.entries().next().expect("entry");
        assert!(first.starts_with("evt-2"));
    }

    #[test]
    fn notices_share_the_bound() {
        let mut log = EventLog::new(2);
        log.record_notice("a");
        log.record_notice("b");
        log.record_notice("c");
        assert_eq!(log.snapshot(), vec!["c".to_string(), "b".to_string()]);
    }
}
