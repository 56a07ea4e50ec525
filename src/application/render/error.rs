use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::job::JobId;
use crate::infra::http::ApiError;

/// Message surfaced when the poll budget runs out.
pub const TIMEOUT_MESSAGE: &str = "timeout while waiting for render completion";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("render request rejected: {0}")]
    Invalid(#[from] DomainError),
    #[error("render submission failed: {0}")]
    Backend(#[from] ApiError),
    #[error("render submission returned no job id")]
    MissingJobId,
}

/// A single poll attempt that did not yield a status. Never fatal.
#[derive(Debug, Error)]
#[error("job status poll failed: {0}")]
pub struct PollTransportError(#[from] pub ApiError);

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("completed job carried no artifact id")]
    MissingArtifact,
    #[error("artifact access denied: {0}")]
    Denied(#[source] ApiError),
    #[error("artifact url response was empty")]
    EmptyUrl,
}

/// Terminal outcome of a render that did not produce a playable URL.
///
/// `Display` is the message meant for the person who asked for the render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("{message}")]
    JobFailed { job_id: JobId, message: String },
    #[error("timeout while waiting for render completion")]
    JobTimedOut { job_id: JobId, attempts: u32 },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("render cancelled")]
    Cancelled,
}

impl RenderError {
    pub fn job_failed(job_id: JobId, message: impl Into<String>) -> Self {
        Self::JobFailed {
            job_id,
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled)
    }

    /// Short label for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            RenderError::Submission(_) => "submission_failed",
            RenderError::JobFailed { .. } => "failed",
            RenderError::JobTimedOut { .. } => "timed_out",
            RenderError::Resolution(_) => "resolution_failed",
            RenderError::Cancelled => "cancelled",
        }
    }
}
