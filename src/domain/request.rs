//! Validated render requests and the owned composer state that builds them.

use std::fmt;

use sonoscope_api_types::RenderJobRequest;
use time::{Duration, OffsetDateTime};

use super::controls::ControlParameters;
use super::error::DomainError;
use super::presets::{DEFAULT_PRESET, PresetDefinition};

pub const MIN_DURATION_SECONDS: u32 = 5;
pub const MAX_DURATION_SECONDS: u32 = 120;
pub const DEFAULT_DURATION_SECONDS: u32 = 20;
pub const DEFAULT_METRIC: &str = "RiskScore";

/// Opaque tenant scope threaded through every backend call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation(
                "workspace_id",
                "must not be empty",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn clamp_duration(seconds: u32) -> u32 {
    seconds.clamp(MIN_DURATION_SECONDS, MAX_DURATION_SECONDS)
}

/// A render request whose invariants have been checked: non-empty metric,
/// `window_start < window_end`, duration within `[5, 120]` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    metric: String,
    preset_name: String,
    duration_seconds: u32,
    window_start: OffsetDateTime,
    window_end: OffsetDateTime,
    controls: ControlParameters,
    anomaly_id: Option<String>,
}

impl RenderRequest {
    pub fn new(
        metric: impl Into<String>,
        preset_name: impl Into<String>,
        duration_seconds: u32,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
        controls: ControlParameters,
    ) -> Result<Self, DomainError> {
        let metric = metric.into().trim().to_string();
        if metric.is_empty() {
            return Err(DomainError::validation("metric", "must not be empty"));
        }
        if window_start >= window_end {
            return Err(DomainError::validation(
                "window",
                format!("start {window_start} must be before end {window_end}"),
            ));
        }

        let preset_name = preset_name.into().trim().to_string();
        let preset_name = if preset_name.is_empty() {
            DEFAULT_PRESET.to_string()
        } else {
            preset_name
        };

        Ok(Self {
            metric,
            preset_name,
            duration_seconds: clamp_duration(duration_seconds),
            window_start,
            window_end,
            controls,
            anomaly_id: None,
        })
    }

    #[must_use]
    pub fn with_anomaly(mut self, anomaly_id: Option<String>) -> Self {
        self.anomaly_id = anomaly_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        self
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn window_start(&self) -> OffsetDateTime {
        self.window_start
    }

    pub fn window_end(&self) -> OffsetDateTime {
        self.window_end
    }

    pub fn controls(&self) -> &ControlParameters {
        &self.controls
    }

    pub fn anomaly_id(&self) -> Option<&str> {
        self.anomaly_id.as_deref()
    }

    pub fn to_wire(&self, workspace: &WorkspaceId) -> RenderJobRequest {
        RenderJobRequest {
            workspace_id: workspace.as_str().to_string(),
            anomaly_id: self.anomaly_id.clone(),
            metric_name: self.metric.clone(),
            preset: self.preset_name.clone(),
            duration: self.duration_seconds,
            start: self.window_start,
            end: self.window_end,
            controls: self.controls.to_wire(),
        }
    }
}

/// Editable per-view render state, owned by whoever drives the controls.
///
/// Replaces ambient UI state: the composer holds the current metric, preset,
/// window and knobs, and produces a validated [`RenderRequest`] on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderComposer {
    metric: String,
    preset_name: String,
    duration_seconds: u32,
    window_start: OffsetDateTime,
    window_end: OffsetDateTime,
    controls: ControlParameters,
    anomaly_id: Option<String>,
}

impl RenderComposer {
    /// Start from the default preset and a one-hour window ending at `now`.
    pub fn new(metric: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            metric: metric.into(),
            preset_name: DEFAULT_PRESET.to_string(),
            duration_seconds: DEFAULT_DURATION_SECONDS,
            window_start: now - Duration::hours(1),
            window_end: now,
            controls: ControlParameters::default(),
            anomaly_id: None,
        }
    }

    /// Overwrite the controls wholesale with the preset's defaults.
    pub fn select_preset(&mut self, preset: &PresetDefinition) -> &mut Self {
        self.preset_name = preset.name().to_string();
        self.controls = preset.controls();
        self
    }

    pub fn set_metric(&mut self, metric: impl Into<String>) -> &mut Self {
        self.metric = metric.into();
        self
    }

    pub fn set_duration(&mut self, seconds: u32) -> &mut Self {
        self.duration_seconds = clamp_duration(seconds);
        self
    }

    pub fn set_window(&mut self, start: OffsetDateTime, end: OffsetDateTime) -> &mut Self {
        self.window_start = start;
        self.window_end = end;
        self
    }

    pub fn set_anomaly(&mut self, anomaly_id: Option<String>) -> &mut Self {
        self.anomaly_id = anomaly_id;
        self
    }

    pub fn controls(&self) -> &ControlParameters {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut ControlParameters {
        &mut self.controls
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn build(&self) -> Result<RenderRequest, DomainError> {
        RenderRequest::new(
            self.metric.clone(),
            self.preset_name.clone(),
            self.duration_seconds,
            self.window_start,
            self.window_end,
            self.controls,
        )
        .map(|request| request.with_anomaly(self.anomaly_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::controls::Knob;
    use crate::domain::presets::PresetCatalog;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    #[test]
    fn inverted_window_is_rejected() {
        let err = RenderRequest::new(
            "Sales",
            "Risk Tension",
            20,
            NOW,
            NOW - Duration::minutes(5),
            ControlParameters::default(),
        )
        .expect_err("inverted window");
        assert!(matches!(err, DomainError::Validation { field: "window", .. }));
    }

    #[test]
    fn equal_bounds_are_rejected() {
        let result = RenderRequest::new("Sales", "", 20, NOW, NOW, ControlParameters::default());
        assert!(result.is_err());
    }

    #[test]
    fn duration_is_clamped_both_ways() {
        let start = NOW - Duration::hours(1);
        let short =
            RenderRequest::new("Sales", "", 1, start, NOW, ControlParameters::default())
                .expect("valid");
        let long =
            RenderRequest::new("Sales", "", 900, start, NOW, ControlParameters::default())
                .expect("valid");
        assert_eq!(short.duration_seconds(), MIN_DURATION_SECONDS);
        assert_eq!(long.duration_seconds(), MAX_DURATION_SECONDS);
        assert_eq!(short.preset_name(), DEFAULT_PRESET);
    }

    #[test]
    fn blank_workspace_is_rejected() {
        assert!(WorkspaceId::new("  ").is_err());
        assert_eq!(WorkspaceId::new(" ws-1 ").expect("ws").as_str(), "ws-1");
    }

    #[test]
    fn selecting_preset_twice_is_idempotent() {
        let catalog = PresetCatalog::builtin();
        let preset = catalog.find("Glitch Harmonics").expect("preset");

        let mut composer = RenderComposer::new(DEFAULT_METRIC, NOW);
        composer.controls_mut().set(Knob::Intensity, 0.2);
        composer.select_preset(preset);
        let once = *composer.controls();
        composer.select_preset(preset);

        assert_eq!(*composer.controls(), once);
        assert_eq!(once, preset.controls());
    }

    #[test]
    fn composer_builds_wire_request() {
        let mut composer = RenderComposer::new("RiskScore", NOW);
        composer
            .set_duration(200)
            .set_anomaly(Some("an-1".into()));
        let request = composer.build().expect("valid");
        let wire = request.to_wire(&WorkspaceId::new("ws").expect("ws"));

        assert_eq!(wire.duration, MAX_DURATION_SECONDS);
        assert_eq!(wire.anomaly_id.as_deref(), Some("an-1"));
        assert_eq!(wire.start, NOW - Duration::hours(1));
        assert_eq!(wire.preset, DEFAULT_PRESET);
    }
}
