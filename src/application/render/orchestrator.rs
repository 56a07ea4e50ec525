use std::fmt;
use std::sync::Arc;

use metrics::counter;
use sonoscope_api_types::ArtifactFormat;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, info, info_span, warn};

use crate::application::backend::RenderBackend;
use crate::application::schedule::{RetryPolicy, Timer};
use crate::domain::job::JobPhase;
use crate::domain::request::{RenderRequest, WorkspaceId};
use crate::infra::telemetry::METRIC_RENDER_OUTCOMES;

use super::error::RenderError;
use super::poller::JobPoller;
use super::resolver::{ArtifactResolver, DEFAULT_URL_TTL_SECONDS, RenderedArtifact};
use super::submitter::JobSubmitter;

/// Coarse status shown to whoever asked for the render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStatus {
    #[default]
    Idle,
    Queueing,
    Processing,
    Completed,
    Failed,
}

impl RenderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStatus::Idle => "idle",
            RenderStatus::Queueing => "queueing",
            RenderStatus::Processing => "processing",
            RenderStatus::Completed => "completed",
            RenderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub poll: RetryPolicy,
    pub format: ArtifactFormat,
    pub expires_seconds: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            poll: RetryPolicy::default(),
            format: ArtifactFormat::Mp3,
            expires_seconds: DEFAULT_URL_TTL_SECONDS,
        }
    }
}

#[derive(Debug)]
pub enum RenderUpdate {
    Status(RenderStatus),
    Finished(Result<RenderedArtifact, RenderError>),
}

/// Submit, poll, resolve.
pub struct RenderOrchestrator {
    workspace: WorkspaceId,
    submitter: JobSubmitter,
    poller: JobPoller,
    resolver: ArtifactResolver,
}

impl RenderOrchestrator {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        timer: Arc<dyn Timer>,
        workspace: WorkspaceId,
        options: RenderOptions,
    ) -> Self {
        Self {
            workspace,
            submitter: JobSubmitter::new(backend.clone()),
            poller: JobPoller::new(backend.clone(), timer, options.poll),
            resolver: ArtifactResolver::new(backend, options.format, options.expires_seconds),
        }
    }

    pub fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    /// Run one render to completion on the current task.
    ///
    /// `on_status` sees `queueing`, then `processing` once the backend has
    /// picked the job up, then exactly one of `completed` or `failed`. A
    /// cancelled render reports nothing further.
    pub async fn run<F>(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
        mut on_status: F,
    ) -> Result<RenderedArtifact, RenderError>
    where
        F: FnMut(RenderStatus) + Send,
    {
        let result = self.drive(request, cancel, &mut on_status).await;
        match &result {
            Ok(artifact) => {
                info!(artifact_id = %artifact.artifact_id, "render ready");
                on_status(RenderStatus::Completed);
            }
            Err(err) if err.is_cancelled() => info!("render cancelled"),
            Err(err) => {
                warn!(outcome = err.outcome(), error = %err, "render did not complete");
                on_status(RenderStatus::Failed);
            }
        }
        let outcome = match &result {
            Ok(_) => "completed",
            Err(err) => err.outcome(),
        };
        counter!(METRIC_RENDER_OUTCOMES, "outcome" => outcome).increment(1);
        result
    }

    async fn drive<F>(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
        on_status: &mut F,
    ) -> Result<RenderedArtifact, RenderError>
    where
        F: FnMut(RenderStatus) + Send,
    {
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        let mut job = self.submitter.submit(&self.workspace, request).await?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let artifact_id = self
            .poller
            .poll(&self.workspace, &mut job, cancel, |phase| match phase {
                JobPhase::Queueing => on_status(RenderStatus::Queueing),
                JobPhase::Processing => on_status(RenderStatus::Processing),
                _ => {}
            })
            .await?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let artifact = self.resolver.resolve(&self.workspace, &artifact_id).await?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        Ok(artifact)
    }

    /// Run the render on a background task and stream its progress.
    pub fn start(self: Arc<Self>, request: RenderRequest) -> RenderHandle {
        let (tx, updates) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let span = info_span!(
            "render",
            workspace = %self.workspace,
            metric = request.metric(),
            preset = request.preset_name()
        );

        let task = tokio::spawn(
            async move {
                let status_tx = tx.clone();
                let outcome = self
                    .run(&request, &token, |status| {
                        let _ = status_tx.send(RenderUpdate::Status(status));
                    })
                    .await;
                let _ = tx.send(RenderUpdate::Finished(outcome));
            }
            .instrument(span),
        );

        RenderHandle {
            updates,
            _guard: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }
}

/// Live view of a background render. Dropping it cancels the render.
pub struct RenderHandle {
    updates: mpsc::UnboundedReceiver<RenderUpdate>,
    cancel: CancellationToken,
    _guard: DropGuard,
    task: JoinHandle<()>,
}

impl RenderHandle {
    /// Next update in order; `None` once the render task has finished and
    /// every update was read.
    pub async fn next(&mut self) -> Option<RenderUpdate> {
        self.updates.recv().await
    }

    /// Stop issuing requests. The request in flight finishes but its result
    /// is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drain status updates and return the final result.
    pub async fn outcome(mut self) -> Result<RenderedArtifact, RenderError> {
        while let Some(update) = self.next().await {
            if let RenderUpdate::Finished(result) = update {
                return result;
            }
        }
        warn!("render task ended without reporting an outcome");
        Err(RenderError::Cancelled)
    }
}
