use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::application::schedule::TokioTimer;
use crate::application::stream::{EventLogHandle, EventStreamClient};
use crate::config::{EventsArgs, Settings};

use super::print::print_json;
use super::{CommandError, connect};

pub async fn handle(settings: &Settings, args: EventsArgs) -> Result<(), CommandError> {
    let (backend, workspace) = connect(settings)?;
    let log = EventLogHandle::new(settings.stream.event_log_capacity.get());
    let client = EventStreamClient::new(backend, Arc::new(TokioTimer), settings.backoff_policy())
        .with_idle_timeout(settings.stream.idle_timeout);

    let (delivered_tx, mut delivered_rx) = mpsc::unbounded_channel();
    let recorder = log.clone();
    let mut subscription = client.subscribe(workspace, move |event| {
        recorder.record(&event);
        let _ = delivered_tx.send(event.id());
    });

    let deadline = async {
        match args.duration_seconds {
            Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut delivered = 0usize;
    let outcome = loop {
        tokio::select! {
            Some(event_id) = delivered_rx.recv() => {
                delivered += 1;
                info!(event_id, delivered, "event received");
                print_json(&log.snapshot())?;
                if args.max_events.is_some_and(|max| delivered >= max) {
                    break Ok(());
                }
            }
            result = subscription.closed() => {
                if let Err(err) = &result {
                    log.record_notice(format!("stream error: {err}"));
                    print_json(&log.snapshot())?;
                }
                break result.map_err(CommandError::from);
            }
            _ = &mut deadline => break Ok(()),
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; closing event stream");
                break Ok(());
            }
        }
    };

    subscription.dispose().await;
    outcome
}
