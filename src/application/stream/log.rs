use std::sync::{Arc, Mutex};

use crate::domain::events::{EventLog, StreamEvent};
use crate::util::lock::mutex_lock;

/// Shared handle to an [`EventLog`] fed from a subscription callback.
#[derive(Debug, Clone, Default)]
pub struct EventLogHandle {
    inner: Arc<Mutex<EventLog>>,
}

impl EventLogHandle {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventLog::new(capacity))),
        }
    }

    pub fn record(&self, event: &StreamEvent) {
        mutex_lock(&self.inner, "stream::log", "record").record(event);
    }

    pub fn record_notice(&self, notice: impl Into<String>) {
        mutex_lock(&self.inner, "stream::log", "record_notice").record_notice(notice);
    }

    pub fn snapshot(&self) -> Vec<String> {
        mutex_lock(&self.inner, "stream::log", "snapshot").snapshot()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.inner, "stream::log", "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Callback suitable for `EventStreamClient::subscribe`.
    pub fn recorder(&self) -> impl FnMut(StreamEvent) + Send + 'static {
        let log = self.clone();
        move |event| log.record(&event)
    }
}
