//! reqwest adapter for the render API and the realtime event stream.

mod error;

pub use error::ApiError;

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sonoscope_api_types::{
    ArtifactFormat, ArtifactUrlResponse, JobStatusResponse, RenderJobQueued, RenderJobRequest,
};
use tracing::debug;

use crate::application::backend::{ByteStream, EventSource, RenderBackend};
use crate::domain::job::JobId;
use crate::domain::request::WorkspaceId;

const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";
const EVENT_STREAM_MIME: &str = "text/event-stream";

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    request_timeout: Duration,
}

impl HttpBackend {
    /// `base` is the API root, e.g. `http://localhost:8000/api/`. The
    /// timeout bounds each JSON call and connection setup; the event stream
    /// itself is left open-ended.
    pub fn new(base: Url, request_timeout: Duration) -> Result<Self, ApiError> {
        let base = normalize_base(base)?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            request_timeout,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("sonoscope/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::BaseUrl(self.base.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!(method = "GET", %url, "backend request");
        let resp = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::handle(resp).await
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method = "POST", %url, "backend request");
        let resp = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        Self::handle(resp).await
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            debug!(%status, %body, "backend rejected request");
            return Err(ApiError::server(status, body));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn normalize_base(mut base: Url) -> Result<Url, ApiError> {
    if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
        return Err(ApiError::BaseUrl(base.to_string()));
    }
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

#[async_trait]
impl RenderBackend for HttpBackend {
    async fn enqueue_render(
        &self,
        request: &RenderJobRequest,
    ) -> Result<RenderJobQueued, ApiError> {
        let url = self.endpoint(&["audio", "render"], &[])?;
        self.post_json(url, request).await
    }

    async fn job_status(
        &self,
        workspace: &WorkspaceId,
        job_id: &JobId,
    ) -> Result<JobStatusResponse, ApiError> {
        let url = self.endpoint(
            &["audio", "jobs", job_id.as_str()],
            &[("workspace_id", workspace.to_string())],
        )?;
        self.get_json(url).await
    }

    async fn artifact_url(
        &self,
        workspace: &WorkspaceId,
        artifact_id: &str,
        format: ArtifactFormat,
        expires_seconds: u32,
    ) -> Result<ArtifactUrlResponse, ApiError> {
        let url = self.endpoint(
            &["audio", artifact_id, "url"],
            &[
                ("workspace_id", workspace.to_string()),
                ("fmt", format.as_str().to_string()),
                ("expires_seconds", expires_seconds.to_string()),
            ],
        )?;
        self.get_json(url).await
    }
}

#[async_trait]
impl EventSource for HttpBackend {
    async fn open(
        &self,
        workspace: &WorkspaceId,
        last_event_id: Option<u64>,
    ) -> Result<ByteStream, ApiError> {
        let mut query = vec![("workspace_id", workspace.to_string())];
        if let Some(id) = last_event_id {
            query.push(("last_event_id", id.to_string()));
        }
        let url = self.endpoint(&["events", "sse"], &query)?;
        debug!(method = "GET", %url, "opening event stream");

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header(LAST_EVENT_ID_HEADER, id.to_string());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::server(status, body));
        }

        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }
}
