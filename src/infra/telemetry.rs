use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_POLL_ATTEMPTS: &str = "sonoscope_poll_attempts_total";
pub const METRIC_RENDER_OUTCOMES: &str = "sonoscope_render_outcomes_total";
pub const METRIC_STREAM_FRAMES: &str = "sonoscope_stream_frames_total";
pub const METRIC_STREAM_PARSE_ERRORS: &str = "sonoscope_stream_parse_errors_total";
pub const METRIC_STREAM_RECONNECTS: &str = "sonoscope_stream_reconnects_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_POLL_ATTEMPTS,
            Unit::Count,
            "Total number of render job status polls issued."
        );
        describe_counter!(
            METRIC_RENDER_OUTCOMES,
            Unit::Count,
            "Total number of finished renders, labelled by outcome."
        );
        describe_counter!(
            METRIC_STREAM_FRAMES,
            Unit::Count,
            "Total number of accepted event stream frames."
        );
        describe_counter!(
            METRIC_STREAM_PARSE_ERRORS,
            Unit::Count,
            "Total number of event stream frames discarded as malformed."
        );
        describe_counter!(
            METRIC_STREAM_RECONNECTS,
            Unit::Count,
            "Total number of event stream disconnects followed by a reconnect attempt."
        );
    });
}
