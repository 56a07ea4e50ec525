//! Request and response shapes for the sonification render API and the
//! realtime event stream.
//!
//! Field names follow the backend's JSON exactly; anything the client does not
//! act on is optional so older or newer backends still decode.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Named SSE event type carrying anomaly detections.
pub const ANOMALY_DETECTED_EVENT: &str = "anomaly.detected";

/// Lifecycle state reported by the backend for a render job.
///
/// Unrecognised strings decode to [`JobStatus::Unknown`] instead of failing,
/// so a poll never errors just because the backend grew a new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown(raw) => raw.as_str(),
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Unknown(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        match value {
            JobStatus::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded audio container the signed URL should point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Mp3,
    Wav,
}

impl ArtifactFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactFormat::Mp3 => "mp3",
            ArtifactFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping knobs sent with a render request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderControls {
    pub tempo_min: f64,
    pub tempo_max: f64,
    pub intensity: f64,
    pub glitch_density: f64,
    pub harmonizer_mix: f64,
    pub pad_depth: f64,
    pub ambient_mix: f64,
}

/// Body of `POST audio/render`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJobRequest {
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_id: Option<String>,
    pub metric_name: String,
    pub preset: String,
    pub duration: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub controls: RenderControls,
}

/// Response of `POST audio/render`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJobQueued {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub workspace_id: Option<String>,
}

/// Response of `GET audio/jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

/// Response of `GET audio/{artifact_id}/url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactUrlResponse {
    pub url: String,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub format: Option<ArtifactFormat>,
    #[serde(default)]
    pub expires_seconds: Option<u32>,
}

/// One JSON frame pushed on `events/sse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, deserialize_with = "deserialize_payload")]
    pub payload: Map<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// jsonb columns can surface as an encoded string depending on the driver codec.
fn deserialize_payload<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(serde::de::Error::custom("payload string is not a JSON object")),
        },
        other => Err(serde::de::Error::custom(format!(
            "payload must be a JSON object, got {other}"
        ))),
    }
}
