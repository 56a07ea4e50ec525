//! Backend traits the render pipeline and the event stream talk through.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use sonoscope_api_types::{
    ArtifactFormat, ArtifactUrlResponse, JobStatusResponse, RenderJobQueued, RenderJobRequest,
};

use crate::domain::job::JobId;
use crate::domain::request::WorkspaceId;
use crate::infra::http::ApiError;

/// Raw body chunks of an open event stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn enqueue_render(&self, request: &RenderJobRequest)
    -> Result<RenderJobQueued, ApiError>;

    async fn job_status(
        &self,
        workspace: &WorkspaceId,
        job_id: &JobId,
    ) -> Result<JobStatusResponse, ApiError>;

    async fn artifact_url(
        &self,
        workspace: &WorkspaceId,
        artifact_id: &str,
        format: ArtifactFormat,
        expires_seconds: u32,
    ) -> Result<ArtifactUrlResponse, ApiError>;
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a server-sent event stream, resuming after `last_event_id` when set.
    async fn open(
        &self,
        workspace: &WorkspaceId,
        last_event_id: Option<u64>,
    ) -> Result<ByteStream, ApiError>;
}
