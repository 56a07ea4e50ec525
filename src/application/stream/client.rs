use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::counter;
use sonoscope_api_types::{ANOMALY_DETECTED_EVENT, EventMessage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::application::backend::{ByteStream, EventSource};
use crate::application::schedule::Timer;
use crate::domain::events::StreamEvent;
use crate::domain::request::WorkspaceId;
use crate::infra::sse::{DEFAULT_EVENT_TYPE, SseDecoder, SseFrame};
use crate::infra::telemetry::{
    METRIC_STREAM_FRAMES, METRIC_STREAM_PARSE_ERRORS, METRIC_STREAM_RECONNECTS,
};

use super::backoff::{Backoff, BackoffPolicy};
use super::error::{StreamError, StreamParseError};

/// Longest silence tolerated on an open stream before it is treated as
/// dropped. The backend sends a keepalive comment every second.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Keeps one server-sent event connection per subscription alive and hands
/// decoded events to a callback, in arrival order, from a single task.
#[derive(Clone)]
pub struct EventStreamClient {
    source: Arc<dyn EventSource>,
    timer: Arc<dyn Timer>,
    policy: BackoffPolicy,
    idle_timeout: Duration,
}

impl EventStreamClient {
    pub fn new(source: Arc<dyn EventSource>, timer: Arc<dyn Timer>, policy: BackoffPolicy) -> Self {
        Self {
            source,
            timer,
            policy,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Reconnect when an open stream yields nothing for `idle_timeout`.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Start delivering events for `workspace`. Must be called inside a
    /// tokio runtime.
    pub fn subscribe<F>(&self, workspace: WorkspaceId, on_event: F) -> Subscription
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let span = info_span!("event_stream", workspace = %workspace);
        let worker = StreamWorker {
            source: self.source.clone(),
            timer: self.timer.clone(),
            backoff: Backoff::new(self.policy),
            workspace,
            high_water: None,
            idle_timeout: self.idle_timeout,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run(on_event).instrument(span));
        Subscription {
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a running subscription.
///
/// Dropping it only signals the delivery task to stop; a callback already in
/// flight on another worker thread may still finish after the drop returns.
/// Use [`Subscription::dispose`] when no further callbacks must run.
pub struct Subscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), StreamError>>>,
}

impl Subscription {
    /// Close the connection and wait for the delivery task to stop. No
    /// callback runs after this returns.
    pub async fn dispose(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Resolve when the subscription ends on its own, e.g. after the
    /// reconnect budget is spent.
    pub async fn closed(&mut self) -> Result<(), StreamError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(err) => Err(StreamError::Task(err.to_string())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Flow {
    Cancelled,
    Disconnected(Option<String>),
}

struct StreamWorker {
    source: Arc<dyn EventSource>,
    timer: Arc<dyn Timer>,
    backoff: Backoff,
    workspace: WorkspaceId,
    high_water: Option<u64>,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl StreamWorker {
    async fn run<F>(mut self, mut on_event: F) -> Result<(), StreamError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let cancel = self.cancel.clone();
        loop {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                opened = self.source.open(&self.workspace, self.high_water) => opened,
            };

            let last_error = match opened {
                Ok(stream) => {
                    info!(resume_after = ?self.high_water, "event stream connected");
                    match self.consume(stream, &mut on_event).await {
                        Flow::Cancelled => return Ok(()),
                        Flow::Disconnected(Some(error)) => error,
                        Flow::Disconnected(None) => "stream closed by server".to_string(),
                    }
                }
                Err(err) => err.to_string(),
            };

            counter!(METRIC_STREAM_RECONNECTS).increment(1);
            let Some(delay) = self.backoff.record_failure() else {
                let attempts = self.backoff.failures();
                warn!(attempts, error = %last_error, "event stream retries exhausted");
                return Err(StreamError::RetriesExhausted {
                    attempts,
                    last_error,
                });
            };
            warn!(
                failures = self.backoff.failures(),
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "event stream disconnected; reconnecting"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = self.timer.sleep(delay) => {}
            }
        }
    }

    async fn consume<F>(&mut self, mut stream: ByteStream, on_event: &mut F) -> Flow
    where
        F: FnMut(StreamEvent) + Send,
    {
        let cancel = self.cancel.clone();
        let mut decoder = SseDecoder::new();
        let mut received = false;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Flow::Cancelled,
                chunk = tokio::time::timeout(self.idle_timeout, stream.next()) => chunk,
            };
            let bytes = match chunk {
                Err(_) => {
                    let idle_ms = self.idle_timeout.as_millis() as u64;
                    return Flow::Disconnected(Some(format!("no data for {idle_ms} ms")));
                }
                Ok(None) => return Flow::Disconnected(None),
                Ok(Some(Err(err))) => return Flow::Disconnected(Some(err.to_string())),
                Ok(Some(Ok(bytes))) => bytes,
            };

            if !received && !bytes.is_empty() {
                received = true;
                self.backoff.reset();
            }
            for frame in decoder.feed(&bytes) {
                if cancel.is_cancelled() {
                    return Flow::Cancelled;
                }
                self.deliver(frame, on_event);
            }
            if let Some(retry) = decoder.take_retry() {
                debug!(retry_ms = retry.as_millis() as u64, "server set reconnect delay");
                self.backoff.set_base(retry);
            }
        }
    }

    fn deliver<F>(&mut self, frame: SseFrame, on_event: &mut F)
    where
        F: FnMut(StreamEvent),
    {
        if frame.event != DEFAULT_EVENT_TYPE && frame.event != ANOMALY_DETECTED_EVENT {
            trace!(event = %frame.event, "ignoring event type");
            return;
        }
        counter!(METRIC_STREAM_FRAMES).increment(1);

        let message: EventMessage = match serde_json::from_str(&frame.data) {
            Ok(message) => message,
            Err(source) => {
                let err = StreamParseError {
                    event: frame.event,
                    source,
                };
                debug!(error = %err, "discarding malformed event frame");
                counter!(METRIC_STREAM_PARSE_ERRORS).increment(1);
                return;
            }
        };

        if self.high_water.is_some_and(|seen| message.id <= seen) {
            debug!(event_id = message.id, "skipping already delivered event");
            return;
        }
        self.high_water = Some(message.id);
        trace!(event_id = message.id, event_type = %message.event_type, "delivering event");
        on_event(StreamEvent::from(message));
    }
}
