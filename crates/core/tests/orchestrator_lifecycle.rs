//! Orchestrator lifecycle integration tests.
//!
//! These tests drive the full pipeline against mock collaborators:
//! pending -> discovering -> transcoding -> mirroring -> complete, plus the
//! failure and cancellation paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_test::assert_ok;

use reelay_core::{
    testing::{fixtures, MockBus, MockMirror, MockSigner},
    OrchestratorConfig, Quality, RelayConfig, SignedEvent, SqliteTaskStore, StartRequest,
    TaskStatus, TaskStore, TranscodeOrchestrator,
};

const WORKER: &str = "worker-pk";

/// Test helper wiring the orchestrator to mock collaborators.
struct TestHarness {
    store: Arc<SqliteTaskStore>,
    bus: Arc<MockBus>,
    mirror: Arc<MockMirror>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            store: Arc::new(SqliteTaskStore::in_memory().expect("in-memory store")),
            bus: Arc::new(MockBus::new()),
            mirror: Arc::new(MockMirror::new()),
        }
    }

    fn create_orchestrator(&self) -> TranscodeOrchestrator {
        // Short windows so the timeout paths finish within test budgets
        let config = OrchestratorConfig {
            discovery_timeout_secs: 1,
            result_timeout_secs: 2,
            existing_result_timeout_secs: 1,
            ..Default::default()
        };

        let relays = RelayConfig {
            read: vec!["wss://relay.test".to_string()],
            write: vec!["wss://relay.test".to_string()],
        };

        TranscodeOrchestrator::new(
            config,
            relays,
            Arc::clone(&self.store) as Arc<dyn TaskStore>,
            Arc::clone(&self.bus) as Arc<dyn reelay_core::MessageBus>,
            Arc::new(MockSigner::new()) as Arc<dyn reelay_core::Signer>,
            Arc::clone(&self.mirror) as Arc<dyn reelay_core::Mirror>,
        )
    }

    async fn advertise_worker(&self) {
        self.bus
            .emit(fixtures::advertisement(WORKER, "Test Transcoder"))
            .await;
    }

    fn create_task(&self, draft_id: &str) -> String {
        self.store
            .register(draft_id, "Test upload")
            .expect("register task")
            .id
    }

    async fn wait_for_status(&self, task_id: &str, expected: TaskStatus, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(task)) = self.store.get(task_id) {
                if task.status == expected {
                    return true;
                }
                if task.status.is_terminal() {
                    return false;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }
}

/// The resolution a job request asked for, from its param tags.
fn requested_resolution(event: &SignedEvent) -> Option<String> {
    event
        .tags
        .iter()
        .find(|t| t.key() == Some("param") && t.value() == Some("resolution"))
        .and_then(|t| t.0.get(2).cloned())
}

/// Script the worker: answer every job request with a progress event and a
/// result named after the requested resolution.
async fn respond_to_all_requests(bus: &MockBus) {
    bus.set_publish_handler(|request| {
        let resolution = requested_resolution(request).unwrap_or_default();
        vec![
            fixtures::feedback(WORKER, &request.id, "processing", "transcoding"),
            fixtures::result(
                WORKER,
                &request.id,
                &format!("https://cdn.example.com/out-{}.mp4", resolution),
            ),
        ]
    })
    .await;
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_single_quality_completes_and_mirrors() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    respond_to_all_requests(&harness.bus).await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();

    tokio_test::assert_ok!(
        orchestrator
            .start(
                StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p])
                    .with_duration(60.0),
            )
            .await
    );

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Complete, Duration::from_secs(3))
            .await,
        "task should complete"
    );

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert!(task.completed_at.is_some());
    assert!(task.error.is_none());

    let state = task.transcode.unwrap();
    assert_eq!(state.completed_qualities, vec![Quality::Q720p]);
    assert_eq!(state.completed_artifacts.len(), 1);
    assert!(state.current_quality.is_none());
    assert!(state.request_id.is_none());

    // The artifact was mirrored to the user's storage
    let artifact = &state.completed_artifacts[0];
    assert_eq!(
        artifact.url,
        "https://storage.example.com/mirror/out-720p.mp4"
    );
    assert_eq!(artifact.quality_label, "720p");
    assert_eq!(harness.mirror.mirrored_urls().await.len(), 1);

    // Terminal task holds no job
    assert!(!orchestrator.has_job(&task_id).await);
    assert_eq!(orchestrator.status().await.live_jobs, 0);
}

#[tokio::test]
async fn test_qualities_complete_strictly_in_queue_order() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    respond_to_all_requests(&harness.bus).await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();

    let artifacts_seen = Arc::new(AtomicUsize::new(0));
    let completions_seen = Arc::new(AtomicUsize::new(0));
    let artifacts = Arc::clone(&artifacts_seen);
    let completions = Arc::clone(&completions_seen);

    let request = StartRequest::new(
        &task_id,
        "https://uploads.example.com/in.mp4",
        vec![Quality::Q480p, Quality::Q720p],
    )
    .with_on_artifact(Arc::new(move |_| {
        artifacts.fetch_add(1, Ordering::SeqCst);
    }))
    .with_on_complete(Arc::new(move |_| {
        completions.fetch_add(1, Ordering::SeqCst);
    }));

    orchestrator.start(request).await.unwrap();

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Complete, Duration::from_secs(5))
            .await
    );

    let state = harness.store.get(&task_id).unwrap().unwrap().transcode.unwrap();
    assert_eq!(
        state.completed_qualities,
        vec![Quality::Q480p, Quality::Q720p]
    );
    assert!(state.is_prefix_consistent());
    assert_eq!(state.completed_artifacts.len(), 2);
    assert_eq!(state.completed_artifacts[0].quality_label, "480p");
    assert_eq!(state.completed_artifacts[1].quality_label, "720p");

    // One request per quality, in order
    let requests = harness
        .bus
        .published_of_kind(reelay_core::bus::TRANSCODE_REQUEST_KIND)
        .await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requested_resolution(&requests[0]).as_deref(), Some("480p"));
    assert_eq!(requested_resolution(&requests[1]).as_deref(), Some("720p"));

    assert_eq!(artifacts_seen.load(Ordering::SeqCst), 2);
    assert_eq!(completions_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_progress_updates_are_persisted() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;

    // Worker reports progress but never finishes
    harness
        .bus
        .set_publish_handler(|request| {
            vec![fixtures::feedback_with_eta(
                WORKER,
                &request.id,
                "processing",
                "45",
                30,
            )]
        })
        .await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p]))
        .await
        .unwrap();

    let start = std::time::Instant::now();
    let mut saw_progress = false;
    while start.elapsed() < Duration::from_secs(2) {
        if let Ok(Some(task)) = harness.store.get(&task_id) {
            if let Some(state) = task.transcode {
                if state.percentage == Some(45.0) && state.eta_seconds == Some(30) {
                    saw_progress = true;
                    break;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(saw_progress, "persisted progress should reach 45%");

    orchestrator.cancel(&task_id).await;
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn test_start_is_noop_while_job_exists() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    // No worker response: the job stays alive waiting for a result

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();

    let request = || StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p]);
    orchestrator.start(request()).await.unwrap();

    // Wait until the pipeline has actually submitted
    let start = std::time::Instant::now();
    while harness
        .bus
        .published_of_kind(reelay_core::bus::TRANSCODE_REQUEST_KIND)
        .await
        .is_empty()
        && start.elapsed() < Duration::from_secs(2)
    {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    // Second start must not touch the live job or submit again
    orchestrator.start(request()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        harness
            .bus
            .published_of_kind(reelay_core::bus::TRANSCODE_REQUEST_KIND)
            .await
            .len(),
        1
    );
    assert_eq!(harness.bus.subscriptions_opened().await, 1);

    orchestrator.cancel(&task_id).await;
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_stops_pipeline_and_freezes_state() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    // No automatic worker response

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(
            &task_id,
            "https://uploads.example.com/in.mp4",
            vec![Quality::Q480p, Quality::Q720p],
        ))
        .await
        .unwrap();

    // Let the first request go out
    let start = std::time::Instant::now();
    let mut requests = vec![];
    while requests.is_empty() && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(25)).await;
        requests = harness
            .bus
            .published_of_kind(reelay_core::bus::TRANSCODE_REQUEST_KIND)
            .await;
    }
    assert_eq!(requests.len(), 1);

    orchestrator.cancel(&task_id).await;

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(!orchestrator.has_job(&task_id).await);

    let state = task.transcode.unwrap();
    assert!(state.current_quality.is_none());
    assert!(state.request_id.is_none());
    assert!(state.completed_qualities.is_empty());

    // A late worker result must not be recorded
    harness
        .bus
        .emit(fixtures::result(
            WORKER,
            &requests[0].id,
            "https://cdn.example.com/late.mp4",
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.transcode.unwrap().completed_qualities.is_empty());
}

#[tokio::test]
async fn test_cancel_without_job_only_updates_status() {
    let harness = TestHarness::new();
    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();

    orchestrator.cancel(&task_id).await;

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);

    // Idempotent: a second cancel leaves the record alone
    let updated_at = task.updated_at;
    orchestrator.cancel(&task_id).await;
    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.updated_at, updated_at);
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test]
async fn test_worker_reported_error_fails_non_retryable() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    harness
        .bus
        .set_publish_handler(|request| {
            vec![fixtures::feedback(
                WORKER,
                &request.id,
                "error",
                "input codec unsupported",
            )]
        })
        .await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p]))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Error, Duration::from_secs(3))
            .await
    );

    let task = harness.store.get(&task_id).unwrap().unwrap();
    let error = task.error.unwrap();
    assert!(!error.retryable);
    assert!(error.message.contains("input codec unsupported"));
}

#[tokio::test]
async fn test_result_timeout_fails_retryable_and_keeps_completed_prefix() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;

    // The worker answers 480p but goes silent for 720p
    harness
        .bus
        .set_publish_handler(|request| {
            if requested_resolution(request).as_deref() == Some("480p") {
                vec![fixtures::result(
                    WORKER,
                    &request.id,
                    "https://cdn.example.com/out-480p.mp4",
                )]
            } else {
                vec![]
            }
        })
        .await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(
            &task_id,
            "https://uploads.example.com/in.mp4",
            vec![Quality::Q480p, Quality::Q720p],
        ))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Error, Duration::from_secs(5))
            .await,
        "task should fail once the 720p result times out"
    );

    let task = harness.store.get(&task_id).unwrap().unwrap();
    let error = task.error.unwrap();
    assert!(error.retryable);

    let state = task.transcode.unwrap();
    assert_eq!(state.completed_qualities, vec![Quality::Q480p]);
    assert_eq!(state.completed_artifacts.len(), 1);
}

#[tokio::test]
async fn test_discovery_timeout_fails_retryable_in_discovering_phase() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    // Queries stall past the discovery window
    harness.bus.set_query_delay(Duration::from_secs(3)).await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p]))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Error, Duration::from_secs(3))
            .await
    );

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert!(task.error.unwrap().retryable);

    let state = task.transcode.unwrap();
    assert_eq!(
        state.phase,
        reelay_core::task::TranscodePhase::Discovering,
        "discovery never resolved a worker"
    );
    assert!(state.worker_id.is_none());
    assert!(state.completed_qualities.is_empty());
}

#[tokio::test]
async fn test_no_worker_found_fails_retryable() {
    let harness = TestHarness::new();
    // No advertisement on the bus

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p]))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Error, Duration::from_secs(3))
            .await
    );

    let task = harness.store.get(&task_id).unwrap().unwrap();
    let error = task.error.unwrap();
    assert!(error.retryable);
    assert!(error.message.contains("no worker"));
}

// =============================================================================
// Mirror step
// =============================================================================

#[tokio::test]
async fn test_mirror_failure_keeps_original_url_and_completes() {
    let harness = TestHarness::new();
    harness.advertise_worker().await;
    respond_to_all_requests(&harness.bus).await;
    harness.mirror.set_fail_all(true).await;

    let task_id = harness.create_task("draft-1");
    let orchestrator = harness.create_orchestrator();
    orchestrator
        .start(StartRequest::new(&task_id, "https://uploads.example.com/in.mp4", vec![Quality::Q720p]))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_status(&task_id, TaskStatus::Complete, Duration::from_secs(3))
            .await,
        "mirror failures must not fail the task"
    );

    let state = harness.store.get(&task_id).unwrap().unwrap().transcode.unwrap();
    assert_eq!(state.completed_qualities, vec![Quality::Q720p]);
    // The unmirrored URL is kept
    assert_eq!(
        state.completed_artifacts[0].url,
        "https://cdn.example.com/out-720p.mp4"
    );
}
