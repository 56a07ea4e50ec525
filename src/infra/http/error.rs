use reqwest::StatusCode;
use thiserror::Error;

/// Transport-level failure talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("base URL `{0}` cannot carry API paths")]
    BaseUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: status {status} body {body}")]
    Server { status: StatusCode, body: String },
    #[error("failed to parse body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn server(status: StatusCode, body: impl Into<String>) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }

    /// HTTP status of a non-2xx response, if that is what failed.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Http(err) => err.status(),
            _ => None,
        }
    }
}
