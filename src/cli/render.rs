use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::application::render::{RenderError, RenderOrchestrator, RenderUpdate};
use crate::application::schedule::TokioTimer;
use crate::config::{KnobArgs, RenderArgs, Settings};
use crate::domain::controls::{ControlParameters, Knob};
use crate::domain::presets::PresetCatalog;
use crate::domain::request::{RenderComposer, RenderRequest};

use super::print::print_json;
use super::{CommandError, connect};

const DEFAULT_WINDOW_MINUTES: u32 = 60;

pub async fn handle(settings: &Settings, args: RenderArgs) -> Result<(), CommandError> {
    let (backend, workspace) = connect(settings)?;
    let request = compose(&args, OffsetDateTime::now_utc())?;

    let orchestrator = Arc::new(RenderOrchestrator::new(
        backend,
        Arc::new(TokioTimer),
        workspace,
        settings.render_options(),
    ));
    let mut handle = orchestrator.start(request);

    loop {
        tokio::select! {
            update = handle.next() => match update {
                Some(RenderUpdate::Status(status)) => eprintln!("status: {status}"),
                Some(RenderUpdate::Finished(result)) => {
                    let artifact = result?;
                    return print_json(&artifact);
                }
                None => return Err(RenderError::Cancelled.into()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; cancelling render");
                handle.cancel();
            }
        }
    }
}

fn compose(args: &RenderArgs, now: OffsetDateTime) -> Result<RenderRequest, CommandError> {
    let catalog = PresetCatalog::builtin();
    let preset = catalog.find(args.preset.as_deref().unwrap_or_default())?;

    let mut composer = RenderComposer::new(args.metric.clone(), now);
    composer
        .select_preset(preset)
        .set_duration(args.duration)
        .set_anomaly(args.anomaly_id.clone());

    match (args.start, args.end) {
        (Some(start), Some(end)) => composer.set_window(start, end),
        _ => {
            let minutes = args.since_minutes.unwrap_or(DEFAULT_WINDOW_MINUTES);
            composer.set_window(now - time::Duration::minutes(i64::from(minutes)), now)
        }
    };

    apply_knobs(composer.controls_mut(), &args.knobs);
    Ok(composer.build()?)
}

fn apply_knobs(controls: &mut ControlParameters, knobs: &KnobArgs) {
    let edits = [
        (Knob::TempoMin, knobs.tempo_min),
        (Knob::TempoMax, knobs.tempo_max),
        (Knob::Intensity, knobs.intensity),
        (Knob::GlitchDensity, knobs.glitch_density),
        (Knob::HarmonizerMix, knobs.harmonizer_mix),
        (Knob::PadDepth, knobs.pad_depth),
        (Knob::AmbientMix, knobs.ambient_mix),
    ];
    for (knob, value) in edits {
        if let Some(value) = value {
            controls.set(knob, value);
        }
    }
}
