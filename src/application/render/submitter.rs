use std::sync::Arc;

use tracing::{info, warn};

use crate::application::backend::RenderBackend;
use crate::domain::job::{JobId, RenderJob};
use crate::domain::request::{RenderRequest, WorkspaceId};

use super::error::SubmissionError;

/// Issues exactly one enqueue call per request. Never retries.
#[derive(Clone)]
pub struct JobSubmitter {
    backend: Arc<dyn RenderBackend>,
}

impl JobSubmitter {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self { backend }
    }

    pub async fn submit(
        &self,
        workspace: &WorkspaceId,
        request: &RenderRequest,
    ) -> Result<RenderJob, SubmissionError> {
        let body = request.to_wire(workspace);
        let queued = self.backend.enqueue_render(&body).await.map_err(|err| {
            warn!(
                workspace = %workspace,
                metric = request.metric(),
                error = %err,
                "render submission failed"
            );
            SubmissionError::Backend(err)
        })?;

        let job_id = JobId::new(queued.job_id).ok_or(SubmissionError::MissingJobId)?;
        info!(
            job_id = %job_id,
            status = %queued.status,
            preset = request.preset_name(),
            "render job queued"
        );
        Ok(RenderJob::new(job_id, &queued.status))
    }
}
