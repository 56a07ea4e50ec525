use thiserror::Error;

use crate::cli::CommandError;
use crate::config::LoadError;
use crate::infra::error::InfraError;

/// Top-level failure of one binary invocation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Command(#[from] CommandError),
}
