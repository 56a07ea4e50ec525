//! Render job bookkeeping and the poller's phase machine.

use std::fmt;

use sonoscope_api_types::{JobStatus, JobStatusResponse};

/// Message used when the backend reports failure without saying why.
pub const GENERIC_FAILURE_MESSAGE: &str = "audio render failed";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RenderJobStatus {
    fn rank(self) -> u8 {
        match self {
            RenderJobStatus::Queued => 0,
            RenderJobStatus::Processing => 1,
            RenderJobStatus::Completed | RenderJobStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RenderJobStatus::Completed | RenderJobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderJobStatus::Queued => "queued",
            RenderJobStatus::Processing => "processing",
            RenderJobStatus::Completed => "completed",
            RenderJobStatus::Failed => "failed",
        }
    }
}

/// What a single status report meant for the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobUpdate {
    Pending,
    Completed { artifact_id: String },
    Failed { message: String },
}

/// Client-side view of one backend job. Status only moves forward; once
/// terminal, later reports are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    job_id: JobId,
    status: RenderJobStatus,
    artifact_id: Option<String>,
    error_message: Option<String>,
}

impl RenderJob {
    pub fn new(job_id: JobId, initial: &JobStatus) -> Self {
        let status = match initial {
            JobStatus::Processing => RenderJobStatus::Processing,
            _ => RenderJobStatus::Queued,
        };
        Self {
            job_id,
            status,
            artifact_id: None,
            error_message: None,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn status(&self) -> RenderJobStatus {
        self.status
    }

    pub fn artifact_id(&self) -> Option<&str> {
        self.artifact_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Fold one poll response into the job.
    ///
    /// `completed` without an artifact id is not terminal. Unknown statuses
    /// and a `queued` report after processing started count as processing.
    pub fn observe(&mut self, report: &JobStatusResponse) -> JobUpdate {
        if self.status.is_terminal() {
            return self.current_update();
        }

        let artifact = report
            .artifact_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let next = match (&report.status, artifact) {
            (JobStatus::Completed, Some(artifact_id)) => {
                self.artifact_id = Some(artifact_id.to_string());
                RenderJobStatus::Completed
            }
            (JobStatus::Failed, _) => {
                let message = report
                    .error
                    .as_deref()
                    .map(str::trim)
                    .filter(|msg| !msg.is_empty())
                    .unwrap_or(GENERIC_FAILURE_MESSAGE);
                self.error_message = Some(message.to_string());
                RenderJobStatus::Failed
            }
            (JobStatus::Queued, _) => RenderJobStatus::Queued,
            _ => RenderJobStatus::Processing,
        };

        if next.rank() > self.status.rank() {
            self.status = next;
        }
        self.current_update()
    }

    fn current_update(&self) -> JobUpdate {
        match self.status {
            RenderJobStatus::Completed => JobUpdate::Completed {
                artifact_id: self.artifact_id.clone().unwrap_or_default(),
            },
            RenderJobStatus::Failed => JobUpdate::Failed {
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            },
            RenderJobStatus::Queued | RenderJobStatus::Processing => JobUpdate::Pending,
        }
    }
}

/// Poller lifecycle: `Idle → Queueing → Processing → {Completed, Failed, TimedOut}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    Queueing,
    Processing,
    Completed,
    Failed,
    TimedOut,
}

impl JobPhase {
    fn rank(self) -> u8 {
        match self {
            JobPhase::Idle => 0,
            JobPhase::Queueing => 1,
            JobPhase::Processing => 2,
            JobPhase::Completed | JobPhase::Failed | JobPhase::TimedOut => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Queueing => "queueing",
            JobPhase::Processing => "processing",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
            JobPhase::TimedOut => "timed_out",
        }
    }
}

/// Guards phase transitions so they only ever move forward.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    current: JobPhase,
}

impl PhaseTracker {
    pub fn current(&self) -> JobPhase {
        self.current
    }

    /// Move to `next` if that is a forward step from a non-terminal phase.
    /// Returns whether the phase changed.
    pub fn advance(&mut self, next: JobPhase) -> bool {
        if self.current.is_terminal() || next.rank() <= self.current.rank() {
            return false;
        }
        self.current = next;
        true
    }
}
