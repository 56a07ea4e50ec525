use std::sync::Arc;

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::backend::RenderBackend;
use crate::application::schedule::{BoundedRetry, RetryPolicy, Timer};
use crate::domain::job::{JobPhase, JobUpdate, PhaseTracker, RenderJob};
use crate::domain::request::WorkspaceId;
use crate::infra::telemetry::METRIC_POLL_ATTEMPTS;

use super::error::{PollTransportError, RenderError};

/// Sequential status polling under a fixed attempt budget.
///
/// Phases reported to the caller are always a forward-only walk through
/// `Queueing`, `Processing` and one terminal phase. A failed poll request
/// spends an attempt but never ends the loop on its own.
#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn RenderBackend>,
    timer: Arc<dyn Timer>,
    policy: RetryPolicy,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn RenderBackend>, timer: Arc<dyn Timer>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            timer,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Poll until the job completes, fails, or the budget runs out. Returns
    /// the artifact id on success.
    pub async fn poll<F>(
        &self,
        workspace: &WorkspaceId,
        job: &mut RenderJob,
        cancel: &CancellationToken,
        mut on_phase: F,
    ) -> Result<String, RenderError>
    where
        F: FnMut(JobPhase) + Send,
    {
        let mut phases = PhaseTracker::default();
        let mut emit = |phase: JobPhase| {
            if phases.advance(phase) {
                on_phase(phase);
            }
        };
        emit(JobPhase::Queueing);

        let mut retry = BoundedRetry::new(self.policy, self.timer.clone(), cancel.clone());
        while let Some(attempt) = retry.next_attempt().await {
            counter!(METRIC_POLL_ATTEMPTS).increment(1);
            let result = self
                .backend
                .job_status(workspace, job.job_id())
                .await
                .map_err(PollTransportError::from);

            if cancel.is_cancelled() {
                debug!(job_id = %job.job_id(), attempt, "discarding poll result after cancel");
                return Err(RenderError::Cancelled);
            }

            let report = match result {
                Ok(report) => report,
                Err(err) => {
                    warn!(job_id = %job.job_id(), attempt, error = %err, "status poll failed");
                    continue;
                }
            };

            match job.observe(&report) {
                JobUpdate::Completed { artifact_id } => {
                    info!(job_id = %job.job_id(), attempt, %artifact_id, "render completed");
                    emit(JobPhase::Completed);
                    return Ok(artifact_id);
                }
                JobUpdate::Failed { message } => {
                    info!(job_id = %job.job_id(), attempt, %message, "render failed");
                    emit(JobPhase::Failed);
                    return Err(RenderError::job_failed(job.job_id().clone(), message));
                }
                JobUpdate::Pending => {
                    debug!(job_id = %job.job_id(), attempt, status = %report.status, "render pending");
                    emit(JobPhase::Processing);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let attempts = retry.attempts();
        warn!(job_id = %job.job_id(), attempts, "render poll budget exhausted");
        emit(JobPhase::TimedOut);
        Err(RenderError::JobTimedOut {
            job_id: job.job_id().clone(),
            attempts,
        })
    }
}
