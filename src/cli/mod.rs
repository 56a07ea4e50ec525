//! Command handlers behind the `sonoscope` binary.

mod events;
mod presets;
mod print;
mod render;

use std::sync::Arc;

use thiserror::Error;

use crate::application::render::RenderError;
use crate::application::stream::StreamError;
use crate::config::{Command, Settings};
use crate::domain::error::DomainError;
use crate::domain::request::WorkspaceId;
use crate::infra::http::{ApiError, HttpBackend};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("API base URL is required (use --api-base-url or SONOSCOPE__API__BASE_URL)")]
    MissingBaseUrl,
    #[error("workspace id is required (use --workspace-id or SONOSCOPE__API__WORKSPACE_ID)")]
    MissingWorkspace,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("failed to render output: {0}")]
    Output(String),
}

pub async fn execute(command: Command, settings: &Settings) -> Result<(), CommandError> {
    match command {
        Command::Render(args) => render::handle(settings, *args).await,
        Command::Events(args) => events::handle(settings, args).await,
        Command::Presets => presets::handle(),
    }
}

/// Backend client and workspace for commands that talk to the API.
fn connect(settings: &Settings) -> Result<(Arc<HttpBackend>, WorkspaceId), CommandError> {
    let base = settings
        .api
        .base_url
        .clone()
        .ok_or(CommandError::MissingBaseUrl)?;
    let workspace = settings
        .api
        .workspace_id
        .as_deref()
        .ok_or(CommandError::MissingWorkspace)
        .and_then(|raw| WorkspaceId::new(raw).map_err(CommandError::from))?;
    let backend = HttpBackend::new(base, settings.api.request_timeout)?;
    Ok((Arc::new(backend), workspace))
}
