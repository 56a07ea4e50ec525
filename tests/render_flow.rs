use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use reqwest::StatusCode;
use sonoscope::application::backend::RenderBackend;
use sonoscope::application::render::{
    JobPoller, RenderError, RenderOptions, RenderOrchestrator, RenderStatus, RenderUpdate,
    SubmissionError, TIMEOUT_MESSAGE,
};
use sonoscope::application::schedule::{RetryPolicy, Timer};
use sonoscope::domain::job::{JobId, JobPhase, RenderJob};
use sonoscope::domain::request::{RenderComposer, RenderRequest, WorkspaceId};
use sonoscope::infra::http::ApiError;
use sonoscope_api_types::{
    ArtifactFormat, ArtifactUrlResponse, JobStatus, JobStatusResponse, RenderJobQueued,
    RenderJobRequest,
};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

struct InstantTimer;

#[async_trait]
impl Timer for InstantTimer {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

struct ShortTimer;

#[async_trait]
impl Timer for ShortTimer {
    async fn sleep(&self, _duration: Duration) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Default)]
struct ScriptedBackend {
    reject_submit: bool,
    statuses: Mutex<VecDeque<JobStatusResponse>>,
    cancel_on_poll: Option<(u32, CancellationToken)>,
    submissions: Mutex<Vec<RenderJobRequest>>,
    polls: AtomicU32,
    resolves: AtomicU32,
}

impl ScriptedBackend {
    fn with_statuses(statuses: Vec<JobStatusResponse>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    fn resolves(&self) -> u32 {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    async fn enqueue_render(&self, request: &RenderJobRequest) -> Result<RenderJobQueued, ApiError> {
        self.submissions.lock().expect("lock").push(request.clone());
        if self.reject_submit {
            return Err(ApiError::server(
                StatusCode::UNPROCESSABLE_ENTITY,
                "{\"detail\":\"end must be after start\"}",
            ));
        }
        Ok(RenderJobQueued {
            job_id: "job-42".to_string(),
            status: JobStatus::Queued,
            workspace_id: Some(request.workspace_id.clone()),
        })
    }

    async fn job_status(
        &self,
        _workspace: &WorkspaceId,
        _job_id: &JobId,
    ) -> Result<JobStatusResponse, ApiError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_poll {
            if poll == *at {
                token.cancel();
            }
        }
        Ok(self
            .statuses
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| status("processing", None, None)))
    }

    async fn artifact_url(
        &self,
        _workspace: &WorkspaceId,
        artifact_id: &str,
        format: ArtifactFormat,
        expires_seconds: u32,
    ) -> Result<ArtifactUrlResponse, ApiError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(ArtifactUrlResponse {
            url: format!("https://cdn.example/{artifact_id}.{format}?sig=abc"),
            artifact_id: Some(artifact_id.to_string()),
            format: Some(format),
            expires_seconds: Some(expires_seconds),
        })
    }
}

fn status(value: &str, artifact: Option<&str>, error: Option<&str>) -> JobStatusResponse {
    JobStatusResponse {
        job_id: Some("job-42".to_string()),
        status: JobStatus::from(value.to_string()),
        artifact_id: artifact.map(str::to_string),
        error: error.map(str::to_string),
        metric_name: None,
        preset: None,
    }
}

fn request() -> RenderRequest {
    RenderComposer::new("RiskScore", OffsetDateTime::now_utc())
        .build()
        .expect("valid request")
}

fn orchestrator(backend: Arc<ScriptedBackend>) -> RenderOrchestrator {
    RenderOrchestrator::new(
        backend,
        Arc::new(InstantTimer),
        WorkspaceId::new("ws-test").expect("workspace"),
        RenderOptions::default(),
    )
}

async fn run(
    backend: Arc<ScriptedBackend>,
    cancel: &CancellationToken,
) -> (Result<sonoscope::application::render::RenderedArtifact, RenderError>, Vec<RenderStatus>) {
    let orchestrator = orchestrator(backend);
    let mut statuses = Vec::new();
    let result = orchestrator
        .run(&request(), cancel, |status| statuses.push(status))
        .await;
    (result, statuses)
}

#[tokio::test]
async fn completes_when_artifact_arrives_on_last_allowed_poll() {
    let mut script: Vec<_> = (0..79).map(|_| status("processing", None, None)).collect();
    script.push(status("completed", Some("art-80"), None));
    let backend = Arc::new(ScriptedBackend::with_statuses(script));

    let (result, statuses) = run(backend.clone(), &CancellationToken::new()).await;

    let artifact = result.expect("completed");
    assert_eq!(artifact.artifact_id, "art-80");
    assert_eq!(artifact.url, "https://cdn.example/art-80.mp3?sig=abc");
    assert_eq!(backend.polls(), 80);
    assert_eq!(backend.resolves(), 1);
    assert_eq!(
        statuses,
        vec![
            RenderStatus::Queueing,
            RenderStatus::Processing,
            RenderStatus::Completed
        ]
    );
}

#[tokio::test]
async fn times_out_after_eighty_processing_polls() {
    let backend = Arc::new(ScriptedBackend::default());

    let (result, statuses) = run(backend.clone(), &CancellationToken::new()).await;

    let err = result.expect_err("timed out");
    assert!(matches!(err, RenderError::JobTimedOut { attempts: 80, .. }));
    assert_eq!(err.to_string(), TIMEOUT_MESSAGE);
    assert_eq!(backend.polls(), 80);
    assert_eq!(backend.resolves(), 0);
    assert_eq!(statuses.last(), Some(&RenderStatus::Failed));
}

#[tokio::test]
async fn backend_failure_on_third_poll_is_surfaced_verbatim() {
    let backend = Arc::new(ScriptedBackend::with_statuses(vec![
        status("processing", None, None),
        status("processing", None, None),
        status("failed", None, Some("render engine overloaded")),
    ]));

    let (result, statuses) = run(backend.clone(), &CancellationToken::new()).await;

    let err = result.expect_err("failed");
    assert_eq!(err.to_string(), "render engine overloaded");
    assert_eq!(backend.polls(), 3);
    assert_eq!(backend.resolves(), 0);
    assert_eq!(
        statuses,
        vec![
            RenderStatus::Queueing,
            RenderStatus::Processing,
            RenderStatus::Failed
        ]
    );
}

#[tokio::test]
async fn rejected_submission_never_polls() {
    let backend = Arc::new(ScriptedBackend {
        reject_submit: true,
        ..ScriptedBackend::default()
    });

    let (result, statuses) = run(backend.clone(), &CancellationToken::new()).await;

    match result.expect_err("rejected") {
        RenderError::Submission(SubmissionError::Backend(err)) => {
            assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
            assert!(err.to_string().contains("end must be after start"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(backend.polls(), 0);
    assert_eq!(statuses, vec![RenderStatus::Failed]);
}

#[tokio::test]
async fn submission_carries_workspace_and_controls() {
    let backend = Arc::new(ScriptedBackend::with_statuses(vec![status(
        "completed",
        Some("art-1"),
        None,
    )]));

    let (result, _) = run(backend.clone(), &CancellationToken::new()).await;
    result.expect("completed");

    let submissions = backend.submissions.lock().expect("lock");
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].workspace_id, "ws-test");
    assert_eq!(submissions[0].preset, "Executive Minimal");
    assert!(submissions[0].controls.tempo_min <= submissions[0].controls.tempo_max - 5.0);
}

#[tokio::test]
async fn cancellation_discards_in_flight_result_and_stops_polling() {
    let cancel = CancellationToken::new();
    let backend = Arc::new(ScriptedBackend {
        cancel_on_poll: Some((2, cancel.clone())),
        statuses: Mutex::new(
            vec![
                status("processing", None, None),
                status("completed", Some("art-late"), None),
            ]
            .into(),
        ),
        ..ScriptedBackend::default()
    });

    let (result, statuses) = run(backend.clone(), &cancel).await;

    assert!(matches!(result, Err(RenderError::Cancelled)));
    assert_eq!(backend.polls(), 2);
    assert_eq!(backend.resolves(), 0);
    assert_eq!(
        statuses,
        vec![RenderStatus::Queueing, RenderStatus::Processing]
    );
}

#[tokio::test]
async fn handle_streams_updates_in_order() {
    let backend = Arc::new(ScriptedBackend::with_statuses(vec![
        status("queued", None, None),
        status("processing", None, None),
        status("completed", Some("art-7"), None),
    ]));
    let mut handle = Arc::new(orchestrator(backend)).start(request());

    let mut labels = Vec::new();
    let outcome = loop {
        match handle.next().await.expect("update") {
            RenderUpdate::Status(status) => labels.push(status.as_str()),
            RenderUpdate::Finished(result) => break result,
        }
    };

    assert_eq!(labels, vec!["queueing", "processing", "completed"]);
    assert_eq!(outcome.expect("artifact").artifact_id, "art-7");
}

#[tokio::test]
async fn dropping_the_handle_stops_polling() {
    let backend = Arc::new(ScriptedBackend::default());
    let orchestrator = Arc::new(RenderOrchestrator::new(
        backend.clone(),
        Arc::new(ShortTimer),
        WorkspaceId::new("ws-test").expect("workspace"),
        RenderOptions::default(),
    ));
    let mut handle = orchestrator.start(request());

    assert!(matches!(
        handle.next().await,
        Some(RenderUpdate::Status(RenderStatus::Queueing))
    ));
    drop(handle);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let polls_after_drop = backend.polls();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(backend.polls(), polls_after_drop);
    assert_eq!(backend.resolves(), 0);
}

fn phase_rank(phase: JobPhase) -> u8 {
    match phase {
        JobPhase::Idle => 0,
        JobPhase::Queueing => 1,
        JobPhase::Processing => 2,
        JobPhase::Completed | JobPhase::Failed | JobPhase::TimedOut => 3,
    }
}

fn scripted_status() -> impl Strategy<Value = JobStatusResponse> {
    prop_oneof![
        Just(status("queued", None, None)),
        Just(status("processing", None, None)),
        Just(status("completed", None, None)),
        Just(status("completed", Some("art"), None)),
        Just(status("failed", None, Some("boom"))),
        Just(status("rendering", None, None)),
    ]
}

proptest! {
    #[test]
    fn poller_phases_are_a_forward_walk(script in prop::collection::vec(scripted_status(), 0..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");

        let phases = runtime.block_on(async {
            let backend = Arc::new(ScriptedBackend::with_statuses(script));
            let poller = JobPoller::new(
                backend,
                Arc::new(InstantTimer),
                RetryPolicy::new(Duration::from_millis(1), NonZeroU32::new(10).expect("non-zero")),
            );
            let workspace = WorkspaceId::new("ws").expect("workspace");
            let mut job = RenderJob::new(JobId::new("job-42").expect("job"), &JobStatus::Queued);
            let mut phases = Vec::new();
            let _ = poller
                .poll(&workspace, &mut job, &CancellationToken::new(), |phase| phases.push(phase))
                .await;
            phases
        });

        prop_assert_eq!(phases.first().copied(), Some(JobPhase::Queueing));
        prop_assert!(phases.windows(2).all(|pair| phase_rank(pair[0]) < phase_rank(pair[1])));
        let terminal = phases.iter().filter(|phase| phase.is_terminal()).count();
        prop_assert_eq!(terminal, 1);
        prop_assert!(phases.last().is_some_and(|phase| phase.is_terminal()));
    }
}
