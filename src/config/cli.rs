use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use sonoscope_api_types::ArtifactFormat;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::request::{DEFAULT_DURATION_SECONDS, DEFAULT_METRIC};

/// Command-line arguments for the sonoscope binary.
#[derive(Debug, Parser)]
#[command(
    name = "sonoscope",
    version,
    about = "Sonification render and realtime event stream client"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SONOSCOPE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the API base URL, e.g. http://localhost:8000/api/.
    #[arg(
        long = "api-base-url",
        env = "SONOSCOPE_API_BASE_URL",
        value_name = "URL",
        value_hint = ValueHint::Url,
        global = true
    )]
    pub api_base_url: Option<String>,

    /// Workspace every request is scoped to.
    #[arg(
        long = "workspace-id",
        env = "SONOSCOPE_WORKSPACE_ID",
        value_name = "ID",
        global = true
    )]
    pub workspace_id: Option<String>,

    /// Override the per-request timeout.
    #[arg(long = "api-request-timeout-seconds", value_name = "SECONDS", global = true)]
    pub request_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Submit a render job, wait for it, and print the signed artifact URL.
    Render(Box<RenderArgs>),
    /// Follow the workspace event stream and print the event log.
    Events(EventsArgs),
    /// Print the built-in presets.
    Presets,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Metric to sonify.
    #[arg(long, default_value = DEFAULT_METRIC)]
    pub metric: String,

    /// Preset name; case-insensitive, defaults to Executive Minimal.
    #[arg(long)]
    pub preset: Option<String>,

    /// Output length in seconds, clamped to 5..=120.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECONDS)]
    pub duration: u32,

    /// Window start (RFC 3339).
    #[arg(long, value_parser = parse_timestamp, requires = "end", conflicts_with = "since_minutes")]
    pub start: Option<OffsetDateTime>,

    /// Window end (RFC 3339).
    #[arg(long, value_parser = parse_timestamp, requires = "start")]
    pub end: Option<OffsetDateTime>,

    /// Window ending now and reaching this many minutes back (default 60).
    #[arg(long, value_name = "MINUTES")]
    pub since_minutes: Option<u32>,

    /// Tie the render to a detected anomaly.
    #[arg(long)]
    pub anomaly_id: Option<String>,

    #[command(flatten)]
    pub overrides: RenderOverrides,

    #[command(flatten)]
    pub knobs: KnobArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the artifact format (mp3|wav).
    #[arg(long = "format", value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<ArtifactFormat>,

    /// Override the signed URL lifetime.
    #[arg(long = "expires-seconds", value_name = "SECONDS")]
    pub expires_seconds: Option<u64>,

    /// Override the delay before each status poll.
    #[arg(long = "poll-interval-ms", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Override the maximum number of status polls.
    #[arg(long = "poll-max-attempts", value_name = "COUNT")]
    pub poll_max_attempts: Option<u64>,
}

/// Individual control edits applied on top of the preset.
#[derive(Debug, Args, Default, Clone)]
pub struct KnobArgs {
    #[arg(long, value_name = "BPM")]
    pub tempo_min: Option<f64>,
    #[arg(long, value_name = "BPM")]
    pub tempo_max: Option<f64>,
    #[arg(long)]
    pub intensity: Option<f64>,
    #[arg(long)]
    pub glitch_density: Option<f64>,
    #[arg(long)]
    pub harmonizer_mix: Option<f64>,
    #[arg(long)]
    pub pad_depth: Option<f64>,
    #[arg(long)]
    pub ambient_mix: Option<f64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct EventsArgs {
    /// Stop after this many events.
    #[arg(long, value_name = "COUNT")]
    pub max_events: Option<usize>,

    /// Stop after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub duration_seconds: Option<u64>,

    #[command(flatten)]
    pub overrides: StreamOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StreamOverrides {
    /// Override the consecutive reconnect failures tolerated.
    #[arg(long = "stream-max-retries", value_name = "COUNT")]
    pub max_retries: Option<u64>,

    /// Override the first reconnect delay.
    #[arg(long = "stream-initial-backoff-ms", value_name = "MS")]
    pub initial_backoff_ms: Option<u64>,

    /// Override the number of log lines kept.
    #[arg(long = "event-log-capacity", value_name = "COUNT")]
    pub event_log_capacity: Option<u64>,
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| format!("expected RFC 3339: {err}"))
}

pub(crate) fn parse_format(raw: &str) -> Result<ArtifactFormat, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mp3" => Ok(ArtifactFormat::Mp3),
        "wav" => Ok(ArtifactFormat::Wav),
        other => Err(format!("unsupported format `{other}` (expected mp3 or wav)")),
    }
}
