//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use sonoscope_api_types::ArtifactFormat;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::render::RenderOptions;
use crate::application::schedule::RetryPolicy;
use crate::application::stream::BackoffPolicy;

mod cli;

pub use cli::{
    CliArgs, Command, EventsArgs, GlobalOverrides, KnobArgs, RenderArgs, RenderOverrides,
    StreamOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sonoscope";
const ENV_PREFIX: &str = "SONOSCOPE";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_POLL_MAX_ATTEMPTS: u64 = 80;
const DEFAULT_EXPIRES_SECONDS: u64 = 600;
const MIN_EXPIRES_SECONDS: u64 = 30;
const MAX_EXPIRES_SECONDS: u64 = 3_600;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_BACKOFF_JITTER: f64 = 0.2;
const DEFAULT_STREAM_MAX_RETRIES: u64 = 10;
const DEFAULT_EVENT_LOG_CAPACITY: u64 = 8;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 15;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub polling: PollingSettings,
    pub artifacts: ArtifactSettings,
    pub stream: StreamSettings,
}

/// Backend location and identity. Both may be absent here; commands that
/// talk to the backend reject a missing value.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Option<Url>,
    pub workspace_id: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct PollingSettings {
    pub interval: Duration,
    pub max_attempts: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct ArtifactSettings {
    pub format: ArtifactFormat,
    pub expires_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: f64,
    pub max_retries: NonZeroU32,
    pub event_log_capacity: NonZeroUsize,
    pub idle_timeout: Duration,
}

impl Settings {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            poll: RetryPolicy::new(self.polling.interval, self.polling.max_attempts),
            format: self.artifacts.format,
            expires_seconds: self.artifacts.expires_seconds,
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: self.stream.initial_backoff,
            max: self.stream.max_backoff,
            jitter: self.stream.jitter,
            max_retries: self.stream.max_retries,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    match &cli.command {
        Command::Render(args) => raw.apply_render_overrides(&args.overrides),
        Command::Events(args) => raw.apply_stream_overrides(&args.overrides),
        Command::Presets => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    logging: RawLoggingSettings,
    polling: RawPollingSettings,
    artifacts: RawArtifactSettings,
    stream: RawStreamSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(workspace) = overrides.workspace_id.as_ref() {
            self.api.workspace_id = Some(workspace.clone());
        }
        if let Some(seconds) = overrides.request_timeout_seconds {
            self.api.request_timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(format) = overrides.format {
            self.artifacts.format = Some(format.as_str().to_string());
        }
        if let Some(seconds) = overrides.expires_seconds {
            self.artifacts.expires_seconds = Some(seconds);
        }
        if let Some(interval) = overrides.poll_interval_ms {
            self.polling.interval_ms = Some(interval);
        }
        if let Some(attempts) = overrides.poll_max_attempts {
            self.polling.max_attempts = Some(attempts);
        }
    }

    fn apply_stream_overrides(&mut self, overrides: &StreamOverrides) {
        if let Some(retries) = overrides.max_retries {
            self.stream.max_retries = Some(retries);
        }
        if let Some(initial) = overrides.initial_backoff_ms {
            self.stream.initial_backoff_ms = Some(initial);
        }
        if let Some(capacity) = overrides.event_log_capacity {
            self.stream.event_log_capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            logging,
            polling,
            artifacts,
            stream,
        } = raw;

        let api = build_api_settings(api)?;
        let logging = build_logging_settings(logging)?;
        let polling = build_polling_settings(polling)?;
        let artifacts = build_artifact_settings(artifacts)?;
        let stream = build_stream_settings(stream)?;

        Ok(Self {
            api,
            logging,
            polling,
            artifacts,
            stream,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let base_url = match non_blank(api.base_url) {
        Some(raw) => {
            let url = Url::parse(&raw)
                .map_err(|err| LoadError::invalid("api.base_url", format!("{raw}: {err}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "api.base_url",
                    "scheme must be http or https",
                ));
            }
            Some(url)
        }
        None => None,
    };

    let timeout_secs = api
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "api.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        workspace_id: non_blank(api.workspace_id),
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_polling_settings(polling: RawPollingSettings) -> Result<PollingSettings, LoadError> {
    let interval_ms = polling.interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if interval_ms == 0 {
        return Err(LoadError::invalid(
            "polling.interval_ms",
            "must be greater than zero",
        ));
    }
    let max_attempts = non_zero_u32(
        polling.max_attempts.unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS),
        "polling.max_attempts",
    )?;

    Ok(PollingSettings {
        interval: Duration::from_millis(interval_ms),
        max_attempts,
    })
}

fn build_artifact_settings(artifacts: RawArtifactSettings) -> Result<ArtifactSettings, LoadError> {
    let format = match non_blank(artifacts.format) {
        Some(raw) => {
            cli::parse_format(&raw).map_err(|reason| LoadError::invalid("artifacts.format", reason))?
        }
        None => ArtifactFormat::default(),
    };

    let expires = artifacts
        .expires_seconds
        .unwrap_or(DEFAULT_EXPIRES_SECONDS);
    if !(MIN_EXPIRES_SECONDS..=MAX_EXPIRES_SECONDS).contains(&expires) {
        return Err(LoadError::invalid(
            "artifacts.expires_seconds",
            format!("must be between {MIN_EXPIRES_SECONDS} and {MAX_EXPIRES_SECONDS}"),
        ));
    }

    Ok(ArtifactSettings {
        format,
        expires_seconds: non_zero_u32(expires, "artifacts.expires_seconds")?.get(),
    })
}

fn build_stream_settings(stream: RawStreamSettings) -> Result<StreamSettings, LoadError> {
    let initial_ms = stream
        .initial_backoff_ms
        .unwrap_or(DEFAULT_INITIAL_BACKOFF_MS);
    if initial_ms == 0 {
        return Err(LoadError::invalid(
            "stream.initial_backoff_ms",
            "must be greater than zero",
        ));
    }
    let max_ms = stream.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS);
    if max_ms < initial_ms {
        return Err(LoadError::invalid(
            "stream.max_backoff_ms",
            "must not be smaller than stream.initial_backoff_ms",
        ));
    }

    let jitter = stream.jitter.unwrap_or(DEFAULT_BACKOFF_JITTER);
    if !(0.0..=1.0).contains(&jitter) {
        return Err(LoadError::invalid(
            "stream.jitter",
            "must be a fraction between 0 and 1",
        ));
    }

    let max_retries = non_zero_u32(
        stream.max_retries.unwrap_or(DEFAULT_STREAM_MAX_RETRIES),
        "stream.max_retries",
    )?;

    let capacity = stream
        .event_log_capacity
        .unwrap_or(DEFAULT_EVENT_LOG_CAPACITY);
    let event_log_capacity = usize::try_from(capacity)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "stream.event_log_capacity",
                "must be greater than zero and fit in usize",
            )
        })?;

    let idle_secs = stream
        .idle_timeout_seconds
        .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS);
    if idle_secs == 0 {
        return Err(LoadError::invalid(
            "stream.idle_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(StreamSettings {
        initial_backoff: Duration::from_millis(initial_ms),
        max_backoff: Duration::from_millis(max_ms),
        jitter,
        max_retries,
        event_log_capacity,
        idle_timeout: Duration::from_secs(idle_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    workspace_id: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPollingSettings {
    interval_ms: Option<u64>,
    max_attempts: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawArtifactSettings {
    format: Option<String>,
    expires_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStreamSettings {
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    jitter: Option<f64>,
    max_retries: Option<u64>,
    event_log_capacity: Option<u64>,
    idle_timeout_seconds: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
