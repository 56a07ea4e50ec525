use thiserror::Error;

/// Why a subscription ended on its own.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(
        "event stream gave up after {attempts} consecutive failed connection attempts: {last_error}"
    )]
    RetriesExhausted { attempts: u32, last_error: String },
    #[error("event stream task failed: {0}")]
    Task(String),
}

/// A frame whose data was not a valid event. Logged and skipped.
#[derive(Debug, Error)]
#[error("malformed `{event}` frame: {source}")]
pub struct StreamParseError {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}
