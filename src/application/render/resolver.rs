use std::sync::Arc;

use serde::Serialize;
use sonoscope_api_types::ArtifactFormat;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::backend::RenderBackend;
use crate::domain::request::WorkspaceId;

use super::error::ResolutionError;

pub const DEFAULT_URL_TTL_SECONDS: u32 = 600;

/// A playable, time-limited link to a finished render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedArtifact {
    pub url: String,
    pub artifact_id: String,
    pub format: ArtifactFormat,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Trades an artifact id for a signed URL. Called once per finished job.
#[derive(Clone)]
pub struct ArtifactResolver {
    backend: Arc<dyn RenderBackend>,
    format: ArtifactFormat,
    expires_seconds: u32,
}

impl ArtifactResolver {
    pub fn new(backend: Arc<dyn RenderBackend>, format: ArtifactFormat, expires_seconds: u32) -> Self {
        Self {
            backend,
            format,
            expires_seconds,
        }
    }

    pub async fn resolve(
        &self,
        workspace: &WorkspaceId,
        artifact_id: &str,
    ) -> Result<RenderedArtifact, ResolutionError> {
        let artifact_id = artifact_id.trim();
        if artifact_id.is_empty() {
            return Err(ResolutionError::MissingArtifact);
        }

        let requested_at = OffsetDateTime::now_utc();
        let response = self
            .backend
            .artifact_url(workspace, artifact_id, self.format, self.expires_seconds)
            .await
            .map_err(|err| {
                warn!(artifact_id, error = %err, "artifact url request failed");
                ResolutionError::Denied(err)
            })?;

        let url = response.url.trim();
        if url.is_empty() {
            return Err(ResolutionError::EmptyUrl);
        }

        let ttl = response.expires_seconds.unwrap_or(self.expires_seconds);
        let expires_at = requested_at + time::Duration::seconds(i64::from(ttl));
        info!(artifact_id, ttl, "artifact url resolved");

        Ok(RenderedArtifact {
            url: url.to_string(),
            artifact_id: response
                .artifact_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| artifact_id.to_string()),
            format: response.format.unwrap_or(self.format),
            expires_at,
        })
    }
}
