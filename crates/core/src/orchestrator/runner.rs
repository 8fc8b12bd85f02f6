//! Transcode orchestrator implementation.
//!
//! One pipeline per task, qualities strictly sequential within it. The job
//! registry enforces at most one live job per task id; the starting-marker
//! set closes the race between a user-triggered start and a resume sweep.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::bus::{MessageBus, Signer};
use crate::config::RelayConfig;
use crate::directory::{DirectoryError, WorkerDirectory};
use crate::metrics;
use crate::mirror::Mirror;
use crate::task::{
    Artifact, Quality, Task, TaskFailure, TaskPatch, TaskStatus, TaskStore, TranscodePhase,
    TranscodeState,
};
use crate::transcoder::{JobClient, JobError, JobProgress, ProgressSink};

use super::config::OrchestratorConfig;
use super::types::{
    ArtifactCallback, CompletionCallback, Job, OrchestratorError, OrchestratorStatus,
    StartRequest, TaskEvent,
};

/// Persists worker progress onto the task's transcode record and fans it
/// out to event subscribers.
struct StoreProgressSink {
    task_id: String,
    store: Arc<dyn TaskStore>,
    events: broadcast::Sender<TaskEvent>,
}

#[async_trait::async_trait]
impl ProgressSink for StoreProgressSink {
    async fn update(&self, progress: JobProgress) {
        match self.store.get(&self.task_id) {
            // Terminal records are frozen; drop late progress silently
            Ok(Some(task)) if task.status.is_terminal() => return,
            Ok(Some(task)) => {
                if let Some(mut state) = task.transcode {
                    if progress.message.is_some() {
                        state.message = progress.message.clone();
                    }
                    if progress.percentage.is_some() {
                        state.percentage = progress.percentage;
                    }
                    if progress.eta_seconds.is_some() {
                        state.eta_seconds = progress.eta_seconds;
                    }
                    if let Err(e) = self
                        .store
                        .update(&self.task_id, TaskPatch::new().with_transcode(state))
                    {
                        warn!(
                            task_id = %self.task_id,
                            error = %e,
                            "failed to persist progress update"
                        );
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "failed to load task for progress update");
            }
        }

        let _ = self.events.send(TaskEvent::Progress {
            task_id: self.task_id.clone(),
            message: progress.message,
            percentage: progress.percentage,
            eta_seconds: progress.eta_seconds,
        });
    }
}

/// Whether the per-quality loop keeps going after one quality resolved.
enum QualityOutcome {
    Done,
    Stop,
}

/// The transcode orchestrator - drives tasks through the pipeline.
#[derive(Clone)]
pub struct TranscodeOrchestrator {
    config: OrchestratorConfig,
    relays: RelayConfig,
    store: Arc<dyn TaskStore>,
    directory: WorkerDirectory,
    client: JobClient,
    mirror: Arc<dyn Mirror>,

    // Runtime state: at most one live job per task id
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    // Guards the window between intent-to-start and job creation
    starting: Arc<StdMutex<HashSet<String>>>,
    events: broadcast::Sender<TaskEvent>,
}

impl TranscodeOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        relays: RelayConfig,
        store: Arc<dyn TaskStore>,
        bus: Arc<dyn MessageBus>,
        signer: Arc<dyn Signer>,
        mirror: Arc<dyn Mirror>,
    ) -> Self {
        let directory = WorkerDirectory::new(
            Arc::clone(&bus),
            StdDuration::from_secs(config.discovery_timeout_secs),
        );
        let client = JobClient::new(
            bus,
            signer,
            StdDuration::from_secs(config.result_timeout_secs),
            StdDuration::from_secs(config.existing_result_timeout_secs),
        );
        let (events, _) = broadcast::channel(64);

        Self {
            config,
            relays,
            store,
            directory,
            client,
            mirror,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            starting: Arc::new(StdMutex::new(HashSet::new())),
            events,
        }
    }

    /// Subscribe to milestone events. Observers never own jobs; dropping
    /// the receiver detaches them without affecting the pipeline.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Whether a live job exists for the task.
    pub async fn has_job(&self, task_id: &str) -> bool {
        self.jobs.read().await.contains_key(task_id)
    }

    /// Current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            live_jobs: self.jobs.read().await.len(),
            pending_count: self.store.count(TaskStatus::Pending).unwrap_or(0) as usize,
            transcoding_count: self.store.count(TaskStatus::Transcoding).unwrap_or(0) as usize,
            mirroring_count: self.store.count(TaskStatus::Mirroring).unwrap_or(0) as usize,
        }
    }

    /// Delete completed/cancelled tasks older than the sweep window.
    pub fn sweep(&self) -> Result<usize, OrchestratorError> {
        let deleted = self
            .store
            .sweep_completed(Duration::days(self.config.sweep_max_age_days as i64))?;
        if deleted > 0 {
            info!(deleted, "swept old completed tasks");
        }
        Ok(deleted)
    }

    /// Start the transcode pipeline for a registered task.
    ///
    /// A no-op if a job already exists (or is being created) for the task:
    /// the existing job is left untouched and no duplicate subscription is
    /// opened.
    pub async fn start(&self, request: StartRequest) -> Result<(), OrchestratorError> {
        let task_id = request.task_id.clone();

        if !self.try_begin(&task_id).await {
            debug!(task_id, "start skipped: job already active");
            return Ok(());
        }

        match self.store.get(&task_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.release_starting(&task_id);
                return Err(OrchestratorError::TaskNotFound(task_id));
            }
            Err(e) => {
                self.release_starting(&task_id);
                return Err(e.into());
            }
        }

        let mut state = TranscodeState::new(request.input_url.clone(), request.qualities.clone());
        if let Some(duration) = request.duration_seconds {
            state = state.with_duration(duration);
        }

        let patch = TaskPatch::new()
            .with_status(TaskStatus::Transcoding)
            .with_transcode(state)
            .clearing_error();
        if let Err(e) = self.store.update(&task_id, patch) {
            self.release_starting(&task_id);
            return Err(e.into());
        }
        self.emit(TaskEvent::StatusChanged {
            task_id: task_id.clone(),
            status: TaskStatus::Transcoding,
        });

        let (job, cancel_rx) = self.install_job(&task_id).await;
        info!(task_id, qualities = ?request.qualities, "transcode pipeline started");

        let this = self.clone();
        let on_artifact = request.on_artifact;
        let on_complete = request.on_complete;
        tokio::spawn(async move {
            this.run_start_pipeline(task_id, job, cancel_rx, on_artifact, on_complete)
                .await;
        });

        Ok(())
    }

    /// Resume a task after a cold start.
    ///
    /// A no-op if a job already exists for the task. Tasks whose transcode
    /// started longer ago than the expiry window are failed without
    /// touching the bus.
    pub async fn resume(
        &self,
        task_id: &str,
        on_artifact: Option<ArtifactCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), OrchestratorError> {
        if !self.try_begin(task_id).await {
            debug!(task_id, "resume skipped: job already active");
            return Ok(());
        }

        let task = match self.store.get(task_id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                self.release_starting(task_id);
                return Err(OrchestratorError::TaskNotFound(task_id.to_string()));
            }
            Err(e) => {
                self.release_starting(task_id);
                return Err(e.into());
            }
        };

        if task.status.is_terminal() {
            self.release_starting(task_id);
            debug!(task_id, status = %task.status, "resume skipped: task already terminal");
            return Ok(());
        }

        let Some(state) = task.transcode else {
            self.release_starting(task_id);
            return Err(OrchestratorError::NotTranscoding(task_id.to_string()));
        };

        // Expiry is decided from persisted state alone, before any bus contact
        let age = Utc::now().signed_duration_since(state.started_at);
        if age > Duration::hours(self.config.resume_expiry_hours as i64) {
            self.release_starting(task_id);
            let failure = TaskFailure::new(
                format!(
                    "task expired after {} hours without completing",
                    self.config.resume_expiry_hours
                ),
                false,
            );
            self.fail_task(task_id, failure).await;
            return Ok(());
        }

        let (job, cancel_rx) = self.install_job(task_id).await;
        info!(task_id, completed = state.completed_qualities.len(), "resuming task");

        let this = self.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            this.run_resume_pipeline(task_id, state, job, cancel_rx, on_artifact, on_complete)
                .await;
        });

        Ok(())
    }

    /// Resume every resumable task with persisted transcode state.
    /// Returns the number of tasks picked up.
    pub async fn resume_all(
        &self,
        on_artifact: Option<ArtifactCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<usize, OrchestratorError> {
        let tasks = self.store.list_resumable()?;

        let mut resumed = 0;
        for task in tasks {
            // Upload-side statuses without transcode state are not ours to drive
            if task.transcode.is_none() {
                continue;
            }
            match self
                .resume(&task.id, on_artifact.clone(), on_complete.clone())
                .await
            {
                Ok(()) => resumed += 1,
                Err(e) => warn!(task_id = %task.id, error = %e, "failed to resume task"),
            }
        }

        if resumed > 0 {
            info!(resumed, "resume sweep finished");
        }
        Ok(resumed)
    }

    /// Cancel a task. Idempotent: with no live job this only updates the
    /// stored status.
    pub async fn cancel(&self, task_id: &str) {
        let job = self.jobs.read().await.get(task_id).cloned();
        if let Some(job) = job {
            job.cancel();
        }
        self.mark_cancelled(task_id).await;
    }

    // ------------------------------------------------------------------
    // Pipeline internals
    // ------------------------------------------------------------------

    async fn run_start_pipeline(
        &self,
        task_id: String,
        job: Job,
        mut cancel_rx: broadcast::Receiver<()>,
        on_artifact: Option<ArtifactCallback>,
        on_complete: Option<CompletionCallback>,
    ) {
        let profile = match self.directory.lookup(&self.relays.read).await {
            Ok(profile) => profile,
            Err(e) => {
                self.fail_task(&task_id, failure_from_directory(&e)).await;
                return;
            }
        };
        info!(task_id, worker_id = %profile.worker_id, "transcode worker resolved");

        // Persist the worker before the first submission so a restart can
        // reuse the same identity
        let Some(mut state) = self.load_state(&task_id).await else {
            return;
        };
        state.worker_id = Some(profile.worker_id);
        state.phase = TranscodePhase::Transcoding;
        if self
            .persist(&task_id, TaskPatch::new().with_transcode(state))
            .await
            .is_none()
        {
            return;
        }

        self.process_qualities(&task_id, &job, &mut cancel_rx, &on_artifact, &on_complete)
            .await;
    }

    async fn run_resume_pipeline(
        &self,
        task_id: String,
        state: TranscodeState,
        job: Job,
        mut cancel_rx: broadcast::Receiver<()>,
        on_artifact: Option<ArtifactCallback>,
        on_complete: Option<CompletionCallback>,
    ) {
        if let (Some(request_id), Some(quality), Some(worker_id)) = (
            state.request_id.clone(),
            state.current_quality,
            state.worker_id.clone(),
        ) {
            // A submission was in flight when the process stopped; the
            // worker may have finished while we were down
            match self
                .client
                .query_existing_result(
                    &request_id,
                    &worker_id,
                    &self.relays.read,
                    quality,
                    state.original_duration_seconds,
                )
                .await
            {
                Ok(Some(artifact)) => {
                    info!(task_id, quality = %quality, "found existing result on resume");
                    if !self
                        .finish_quality(&task_id, quality, artifact, &on_artifact)
                        .await
                    {
                        return;
                    }
                }
                Ok(None) => {
                    debug!(task_id, request_id, "no existing result; re-subscribing");
                    match self
                        .await_and_finish(
                            &task_id,
                            &request_id,
                            &worker_id,
                            quality,
                            state.original_duration_seconds,
                            &mut cancel_rx,
                            &on_artifact,
                        )
                        .await
                    {
                        QualityOutcome::Done => {}
                        QualityOutcome::Stop => return,
                    }
                }
                Err(e) => {
                    self.fail_task(&task_id, failure_from_job(&e)).await;
                    return;
                }
            }
        } else if state.worker_id.is_none() {
            // Went down before discovery finished; run it again
            match self.directory.lookup(&self.relays.read).await {
                Ok(profile) => {
                    let Some(mut state) = self.load_state(&task_id).await else {
                        return;
                    };
                    state.worker_id = Some(profile.worker_id);
                    state.phase = TranscodePhase::Transcoding;
                    if self
                        .persist(&task_id, TaskPatch::new().with_transcode(state))
                        .await
                        .is_none()
                    {
                        return;
                    }
                }
                Err(e) => {
                    self.fail_task(&task_id, failure_from_directory(&e)).await;
                    return;
                }
            }
        }

        self.process_qualities(&task_id, &job, &mut cancel_rx, &on_artifact, &on_complete)
            .await;
    }

    /// The per-quality loop, shared by start and resume paths.
    async fn process_qualities(
        &self,
        task_id: &str,
        job: &Job,
        cancel_rx: &mut broadcast::Receiver<()>,
        on_artifact: &Option<ArtifactCallback>,
        on_complete: &Option<CompletionCallback>,
    ) {
        loop {
            if job.is_cancelled() {
                self.mark_cancelled(task_id).await;
                return;
            }

            let Some(state) = self.load_state(task_id).await else {
                return;
            };

            let remaining = state.remaining_qualities();
            let Some(&quality) = remaining.first() else {
                self.complete_task(task_id, on_complete).await;
                return;
            };

            let Some(worker_id) = state.worker_id.clone() else {
                self.fail_task(
                    task_id,
                    TaskFailure::new("no worker recorded for in-flight task", true),
                )
                .await;
                return;
            };

            // Persist the quality we are about to submit
            let mut next = state.clone();
            next.current_quality = Some(quality);
            next.phase = TranscodePhase::Transcoding;
            let patch = TaskPatch::new()
                .with_status(TaskStatus::Transcoding)
                .with_transcode(next);
            if self.persist(task_id, patch).await.is_none() {
                return;
            }

            let request_id = match self
                .client
                .submit(&worker_id, &state.input_url, quality, &self.relays.write)
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    self.fail_task(task_id, failure_from_job(&e)).await;
                    return;
                }
            };
            metrics::JOBS_SUBMITTED.inc();

            // Persist the correlation id; resume picks the job up from here
            let Some(mut with_request) = self.load_state(task_id).await else {
                return;
            };
            with_request.request_id = Some(request_id.clone());
            if self
                .persist(task_id, TaskPatch::new().with_transcode(with_request))
                .await
                .is_none()
            {
                return;
            }

            // The publish was allowed to finish; discard its result if a
            // cancel arrived meanwhile
            if job.is_cancelled() {
                self.mark_cancelled(task_id).await;
                return;
            }

            match self
                .await_and_finish(
                    task_id,
                    &request_id,
                    &worker_id,
                    quality,
                    state.original_duration_seconds,
                    cancel_rx,
                    on_artifact,
                )
                .await
            {
                QualityOutcome::Done => {}
                QualityOutcome::Stop => return,
            }
        }
    }

    /// Wait for one job's terminal event and record its outcome.
    #[allow(clippy::too_many_arguments)]
    async fn await_and_finish(
        &self,
        task_id: &str,
        request_id: &str,
        worker_id: &str,
        quality: Quality,
        known_duration: Option<f64>,
        cancel_rx: &mut broadcast::Receiver<()>,
        on_artifact: &Option<ArtifactCallback>,
    ) -> QualityOutcome {
        let sink = StoreProgressSink {
            task_id: task_id.to_string(),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
        };

        let started = std::time::Instant::now();
        let result = self
            .client
            .await_result(
                request_id,
                worker_id,
                &self.relays.read,
                quality,
                known_duration,
                &sink,
                cancel_rx,
            )
            .await;

        match result {
            Ok(artifact) => {
                metrics::JOB_DURATION
                    .with_label_values(&[quality.label()])
                    .observe(started.elapsed().as_secs_f64());
                if self
                    .finish_quality(task_id, quality, artifact, on_artifact)
                    .await
                {
                    QualityOutcome::Done
                } else {
                    QualityOutcome::Stop
                }
            }
            Err(JobError::Cancelled) => {
                self.mark_cancelled(task_id).await;
                QualityOutcome::Stop
            }
            Err(e) => {
                self.fail_task(task_id, failure_from_job(&e)).await;
                QualityOutcome::Stop
            }
        }
    }

    /// Mirror the artifact (best effort), record the finished quality, and
    /// notify. Returns false when the pipeline must stop.
    async fn finish_quality(
        &self,
        task_id: &str,
        quality: Quality,
        artifact: Artifact,
        on_artifact: &Option<ArtifactCallback>,
    ) -> bool {
        let Some(mut state) = self.load_state(task_id).await else {
            return false;
        };
        state.phase = TranscodePhase::Mirroring;
        let patch = TaskPatch::new()
            .with_status(TaskStatus::Mirroring)
            .with_transcode(state.clone());
        if self.persist(task_id, patch).await.is_none() {
            return false;
        }
        self.emit(TaskEvent::StatusChanged {
            task_id: task_id.to_string(),
            status: TaskStatus::Mirroring,
        });

        let artifact = self.mirror_artifact(artifact).await;

        state.record_completed(quality, artifact.clone());
        state.phase = TranscodePhase::Transcoding;
        let patch = TaskPatch::new()
            .with_status(TaskStatus::Transcoding)
            .with_transcode(state);
        if self.persist(task_id, patch).await.is_none() {
            return false;
        }

        info!(task_id, quality = %quality, url = %artifact.url, "quality finished");
        self.emit(TaskEvent::ArtifactReady {
            task_id: task_id.to_string(),
            artifact: artifact.clone(),
        });
        if let Some(callback) = on_artifact {
            callback(artifact);
        }
        true
    }

    /// Best-effort mirror step. Failures keep the original artifact URL.
    async fn mirror_artifact(&self, artifact: Artifact) -> Artifact {
        match self
            .mirror
            .mirror(&artifact.url, None, artifact.size_bytes)
            .await
        {
            Ok(mirrored) => {
                let mut artifact = artifact;
                if artifact.size_bytes.is_none() {
                    artifact.size_bytes = mirrored.size_bytes;
                }
                artifact.url = mirrored.url;
                artifact
            }
            Err(e) => {
                warn!(url = %artifact.url, error = %e, "mirror failed; keeping the original artifact url");
                metrics::MIRROR_FAILURES.inc();
                artifact
            }
        }
    }

    async fn complete_task(&self, task_id: &str, on_complete: &Option<CompletionCallback>) {
        let patch = TaskPatch::new()
            .with_status(TaskStatus::Complete)
            .with_completed_at(Utc::now());
        let Some(task) = self.persist(task_id, patch).await else {
            return;
        };
        self.destroy_job(task_id).await;
        metrics::TASKS_COMPLETED.inc();
        info!(task_id, "task complete");
        self.emit(TaskEvent::Completed {
            task_id: task_id.to_string(),
        });
        if let Some(callback) = on_complete {
            callback(task);
        }
    }

    async fn fail_task(&self, task_id: &str, failure: TaskFailure) {
        warn!(
            task_id,
            message = %failure.message,
            retryable = failure.retryable,
            "task failed"
        );
        let patch = TaskPatch::new()
            .with_status(TaskStatus::Error)
            .with_error(failure.clone());
        if let Err(e) = self.store.update(task_id, patch) {
            error!(task_id, error = %e, "failed to persist task failure");
        }
        self.destroy_job(task_id).await;
        metrics::TASKS_FAILED.inc();
        self.emit(TaskEvent::Failed {
            task_id: task_id.to_string(),
            message: failure.message,
            retryable: failure.retryable,
        });
    }

    /// Mark a task cancelled, once. Later calls (pipeline checkpoint vs an
    /// explicit cancel) see a terminal status and do nothing.
    async fn mark_cancelled(&self, task_id: &str) {
        match self.store.get(task_id) {
            Ok(Some(task)) if !task.status.is_terminal() => {
                let mut patch = TaskPatch::new().with_status(TaskStatus::Cancelled);
                if let Some(mut state) = task.transcode {
                    state.clear_in_flight();
                    patch = patch.with_transcode(state);
                }
                if let Err(e) = self.store.update(task_id, patch) {
                    error!(task_id, error = %e, "failed to persist cancellation");
                }
                metrics::TASKS_CANCELLED.inc();
                info!(task_id, "task cancelled");
                self.emit(TaskEvent::Cancelled {
                    task_id: task_id.to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => error!(task_id, error = %e, "failed to load task for cancellation"),
        }
        self.destroy_job(task_id).await;
    }

    // ------------------------------------------------------------------
    // Job registry
    // ------------------------------------------------------------------

    /// Claim the right to create a job for the task. Returns false when a
    /// job exists or another start/resume is mid-creation.
    async fn try_begin(&self, task_id: &str) -> bool {
        {
            let mut starting = self.starting.lock().unwrap();
            if starting.contains(task_id) {
                return false;
            }
            starting.insert(task_id.to_string());
        }
        if self.jobs.read().await.contains_key(task_id) {
            self.release_starting(task_id);
            return false;
        }
        true
    }

    fn release_starting(&self, task_id: &str) {
        self.starting.lock().unwrap().remove(task_id);
    }

    /// Install the job and release the starting marker. The returned
    /// receiver is subscribed before any wait, so a cancel signal can
    /// never be missed.
    async fn install_job(&self, task_id: &str) -> (Job, broadcast::Receiver<()>) {
        let job = Job::new();
        let cancel_rx = job.cancel_signal();
        self.jobs
            .write()
            .await
            .insert(task_id.to_string(), job.clone());
        self.release_starting(task_id);
        (job, cancel_rx)
    }

    async fn destroy_job(&self, task_id: &str) {
        self.jobs.write().await.remove(task_id);
    }

    // ------------------------------------------------------------------
    // Store helpers
    // ------------------------------------------------------------------

    /// Load the task's transcode state; tears the job down when the task
    /// disappeared, went terminal under us, or the store is broken.
    /// Terminal records are frozen: no pipeline write may land after them.
    async fn load_state(&self, task_id: &str) -> Option<TranscodeState> {
        match self.store.get(task_id) {
            Ok(Some(task)) if task.status.is_terminal() => {
                debug!(task_id, status = %task.status, "task went terminal mid-pipeline");
                self.destroy_job(task_id).await;
                None
            }
            Ok(Some(task)) => match task.transcode {
                Some(state) => Some(state),
                None => {
                    warn!(task_id, "task lost its transcode state mid-pipeline");
                    self.destroy_job(task_id).await;
                    None
                }
            },
            Ok(None) => {
                warn!(task_id, "task disappeared mid-pipeline");
                self.destroy_job(task_id).await;
                None
            }
            Err(e) => {
                error!(task_id, error = %e, "failed to load task");
                self.destroy_job(task_id).await;
                None
            }
        }
    }

    /// Apply a milestone patch; tears the job down on store failure.
    async fn persist(&self, task_id: &str, patch: TaskPatch) -> Option<Task> {
        match self.store.update(task_id, patch) {
            Ok(task) => Some(task),
            Err(e) => {
                error!(task_id, error = %e, "failed to persist milestone update");
                self.destroy_job(task_id).await;
                None
            }
        }
    }

    fn emit(&self, event: TaskEvent) {
        let _ = self.events.send(event);
    }
}

fn failure_from_directory(error: &DirectoryError) -> TaskFailure {
    // Discovery failures are network-shaped; a later retry may find a worker
    TaskFailure::new(error.to_string(), true)
}

fn failure_from_job(error: &JobError) -> TaskFailure {
    TaskFailure::new(error.to_string(), error.is_retryable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SqliteTaskStore;
    use crate::testing::{MockBus, MockMirror, MockSigner};

    fn test_orchestrator() -> TranscodeOrchestrator {
        let relays = RelayConfig {
            read: vec!["wss://relay.test".to_string()],
            write: vec!["wss://relay.test".to_string()],
        };
        TranscodeOrchestrator::new(
            OrchestratorConfig::default(),
            relays,
            Arc::new(SqliteTaskStore::in_memory().unwrap()),
            Arc::new(MockBus::new()),
            Arc::new(MockSigner::new()),
            Arc::new(MockMirror::new()),
        )
    }

    #[tokio::test]
    async fn test_try_begin_blocks_double_claim() {
        let orchestrator = test_orchestrator();

        assert!(orchestrator.try_begin("task-1").await);
        // Marker held: a concurrent claim must fail
        assert!(!orchestrator.try_begin("task-1").await);
        // Other tasks are unaffected
        assert!(orchestrator.try_begin("task-2").await);

        orchestrator.release_starting("task-1");
        assert!(orchestrator.try_begin("task-1").await);
    }

    #[tokio::test]
    async fn test_try_begin_blocks_when_job_installed() {
        let orchestrator = test_orchestrator();

        assert!(orchestrator.try_begin("task-1").await);
        let (_job, _rx) = orchestrator.install_job("task-1").await;

        // Marker released, but the live job still blocks new claims
        assert!(!orchestrator.try_begin("task-1").await);

        orchestrator.destroy_job("task-1").await;
        assert!(orchestrator.try_begin("task-1").await);
    }

    #[tokio::test]
    async fn test_start_unknown_task_errors() {
        let orchestrator = test_orchestrator();

        let result = orchestrator
            .start(StartRequest::new("nope", "https://example.com/in.mp4", vec![]))
            .await;
        assert!(matches!(result, Err(OrchestratorError::TaskNotFound(_))));
        // The failed start left no marker behind
        assert!(orchestrator.try_begin("nope").await);
    }

    #[tokio::test]
    async fn test_failure_mapping() {
        let failure = failure_from_job(&JobError::ResultTimeout);
        assert!(failure.retryable);

        let failure = failure_from_job(&JobError::WorkerReported("bad input".into()));
        assert!(!failure.retryable);
        assert!(failure.message.contains("bad input"));

        let failure = failure_from_directory(&DirectoryError::NoWorkerFound);
        assert!(failure.retryable);
    }
}
