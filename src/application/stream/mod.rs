//! Realtime event subscription with bounded reconnects.

mod backoff;
mod client;
mod error;
mod log;

pub use backoff::{Backoff, BackoffPolicy};
pub use client::{DEFAULT_IDLE_TIMEOUT, EventStreamClient, Subscription};
pub use error::{StreamError, StreamParseError};
pub use log::EventLogHandle;
