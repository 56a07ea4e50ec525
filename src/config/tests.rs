use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use super::*;

fn args(argv: &[&str]) -> CliArgs {
    CliArgs::parse_from(argv)
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert!(settings.api.base_url.is_none());
    assert!(settings.api.workspace_id.is_none());
    assert_eq!(settings.polling.interval, Duration::from_millis(2_000));
    assert_eq!(settings.polling.max_attempts.get(), 80);
    assert_eq!(settings.artifacts.format, ArtifactFormat::Mp3);
    assert_eq!(settings.artifacts.expires_seconds, 600);
    assert_eq!(settings.stream.initial_backoff, Duration::from_millis(500));
    assert_eq!(settings.stream.max_backoff, Duration::from_secs(30));
    assert_eq!(settings.stream.max_retries.get(), 10);
    assert_eq!(settings.stream.event_log_capacity.get(), 8);
    assert_eq!(settings.stream.idle_timeout, Duration::from_secs(15));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.polling.interval_ms = Some(5_000);
    raw.logging.level = Some("info".to_string());

    let cli = args(&[
        "sonoscope",
        "--log-level",
        "debug",
        "render",
        "--poll-interval-ms",
        "250",
    ]);
    raw.apply_global_overrides(&cli.overrides);
    match &cli.command {
        Command::Render(render) => raw.apply_render_overrides(&render.overrides),
        other => panic!("wrong command parsed: {other:?}"),
    }
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.polling.interval, Duration::from_millis(250));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_global_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_workspace_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.api.workspace_id = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.api.workspace_id.is_none());
}

#[test]
fn rejects_non_http_base_url() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("ftp://example.com/api".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid base url");
    assert!(matches!(err, LoadError::Invalid { key: "api.base_url", .. }));
}

#[test]
fn rejects_zero_poll_attempts() {
    let mut raw = RawSettings::default();
    raw.polling.max_attempts = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero attempts");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "polling.max_attempts",
            ..
        }
    ));
}

#[test]
fn rejects_zero_stream_idle_timeout() {
    let mut raw = RawSettings::default();
    raw.stream.idle_timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero idle timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "stream.idle_timeout_seconds",
            ..
        }
    ));
}

#[test]
fn rejects_expiry_outside_backend_bounds() {
    let mut raw = RawSettings::default();
    raw.artifacts.expires_seconds = Some(7_200);
    let err = Settings::from_raw(raw).expect_err("expiry too long");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "artifacts.expires_seconds",
            ..
        }
    ));
}

#[test]
fn rejects_unknown_artifact_format() {
    let mut raw = RawSettings::default();
    raw.artifacts.format = Some("flac".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn rejects_jitter_above_one() {
    let mut raw = RawSettings::default();
    raw.stream.jitter = Some(1.5);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn render_options_follow_settings() {
    let mut raw = RawSettings::default();
    raw.artifacts.format = Some("WAV".to_string());
    raw.polling.max_attempts = Some(3);
    let settings = Settings::from_raw(raw).expect("valid settings");

    let options = settings.render_options();
    assert_eq!(options.format, ArtifactFormat::Wav);
    assert_eq!(options.poll.max_attempts.get(), 3);
    assert_eq!(options.expires_seconds, 600);
}

#[test]
fn parse_render_arguments() {
    let cli = args(&[
        "sonoscope",
        "--workspace-id",
        "demo",
        "render",
        "--metric",
        "Revenue",
        "--preset",
        "risk tension",
        "--start",
        "2024-05-01T09:00:00Z",
        "--end",
        "2024-05-01T10:00:00Z",
        "--tempo-min",
        "90",
        "--format",
        "wav",
    ]);

    assert_eq!(cli.overrides.workspace_id.as_deref(), Some("demo"));
    match cli.command {
        Command::Render(render) => {
            assert_eq!(render.metric, "Revenue");
            assert_eq!(render.preset.as_deref(), Some("risk tension"));
            assert_eq!(render.duration, 20);
            assert!(render.start.is_some() && render.end.is_some());
            assert_eq!(render.knobs.tempo_min, Some(90.0));
            assert_eq!(render.overrides.format, Some(ArtifactFormat::Wav));
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn start_without_end_is_rejected() {
    let result = CliArgs::try_parse_from([
        "sonoscope",
        "render",
        "--start",
        "2024-05-01T09:00:00Z",
    ]);
    assert!(result.is_err());
}

#[test]
fn parse_events_arguments() {
    let cli = args(&[
        "sonoscope",
        "events",
        "--max-events",
        "5",
        "--stream-max-retries",
        "3",
    ]);

    match cli.command {
        Command::Events(events) => {
            assert_eq!(events.max_events, Some(5));
            assert_eq!(events.overrides.max_retries, Some(3));
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
#[serial]
fn file_then_environment_then_cli() {
    let mut file = NamedTempFile::with_suffix(".toml").expect("tmp file");
    writeln!(
        file,
        "[api]\nbase_url = \"http://file.example/api/\"\nworkspace_id = \"from-file\"\n\n[polling]\ninterval_ms = 1500\nmax_attempts = 12\n"
    )
    .expect("write config");

    // SAFETY: serialised with every other env-mutating test.
    unsafe {
        std::env::set_var("SONOSCOPE__POLLING__MAX_ATTEMPTS", "7");
    }

    let path = file.path().to_string_lossy().into_owned();
    let cli = args(&[
        "sonoscope",
        "--config-file",
        path.as_str(),
        "--workspace-id",
        "from-cli",
        "presets",
    ]);
    let result = load(&cli);

    unsafe {
        std::env::remove_var("SONOSCOPE__POLLING__MAX_ATTEMPTS");
    }

    let settings = result.expect("settings");
    assert_eq!(
        settings.api.base_url.as_ref().map(Url::as_str),
        Some("http://file.example/api/")
    );
    assert_eq!(settings.api.workspace_id.as_deref(), Some("from-cli"));
    assert_eq!(settings.polling.interval, Duration::from_millis(1_500));
    assert_eq!(settings.polling.max_attempts.get(), 7);
}
