//! Types for the transcode orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::task::{Artifact, Quality, Task, TaskError, TaskStatus};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Task not found in the store.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Resume was asked for a task that never started transcoding.
    #[error("task has no transcode state: {0}")]
    NotTranscoding(String),

    /// Task store error.
    #[error("task store error: {0}")]
    Store(#[from] TaskError),
}

/// Runtime handle for one in-flight task pipeline.
///
/// Never persisted; lives only in the orchestrator's job registry, at most
/// one per task id. Cancellation is cooperative: the flag is polled at the
/// pipeline's checkpoints and the broadcast signal aborts in-flight waits.
#[derive(Debug, Clone)]
pub struct Job {
    cancel_tx: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl Job {
    /// Create a job with a fresh cancellation handle.
    pub fn new() -> Self {
        let (cancel_tx, _) = broadcast::channel(1);
        Self {
            cancel_tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trigger cancellation. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.cancel_tx.send(());
    }

    /// Whether cancellation was triggered.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// A receiver that fires once cancellation is triggered.
    ///
    /// Subscribe before entering any wait; a signal sent while the receiver
    /// is not being polled stays buffered.
    pub fn cancel_signal(&self) -> broadcast::Receiver<()> {
        self.cancel_tx.subscribe()
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

/// Milestone notification for observers (UI, logs).
///
/// Observers attach via [`TranscodeOrchestrator::subscribe_events`] and
/// never own the underlying job.
///
/// [`TranscodeOrchestrator::subscribe_events`]: super::TranscodeOrchestrator::subscribe_events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// The task moved to a new status.
    StatusChanged { task_id: String, status: TaskStatus },
    /// The worker reported progress for the current quality.
    Progress {
        task_id: String,
        message: Option<String>,
        percentage: Option<f32>,
        eta_seconds: Option<u64>,
    },
    /// One quality finished and its artifact was recorded.
    ArtifactReady { task_id: String, artifact: Artifact },
    /// All requested qualities finished.
    Completed { task_id: String },
    /// The task failed.
    Failed {
        task_id: String,
        message: String,
        retryable: bool,
    },
    /// The task was cancelled.
    Cancelled { task_id: String },
}

/// Called after each finished quality with its artifact.
pub type ArtifactCallback = Arc<dyn Fn(Artifact) + Send + Sync>;

/// Called once when every requested quality finished.
pub type CompletionCallback = Arc<dyn Fn(Task) + Send + Sync>;

/// Parameters for starting a transcode pipeline.
pub struct StartRequest {
    /// Task to drive (must already be registered).
    pub task_id: String,
    /// URL of the uploaded input.
    pub input_url: String,
    /// Qualities to produce, in order.
    pub qualities: Vec<Quality>,
    /// Input duration in seconds, when known from upload probing.
    pub duration_seconds: Option<f64>,
    /// Invoked after each finished quality.
    pub on_artifact: Option<ArtifactCallback>,
    /// Invoked once the task completes.
    pub on_complete: Option<CompletionCallback>,
}

impl StartRequest {
    /// Create a request with no callbacks.
    pub fn new(
        task_id: impl Into<String>,
        input_url: impl Into<String>,
        qualities: Vec<Quality>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            input_url: input_url.into(),
            qualities,
            duration_seconds: None,
            on_artifact: None,
            on_complete: None,
        }
    }

    /// Set the known input duration.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Attach a per-artifact callback.
    pub fn with_on_artifact(mut self, callback: ArtifactCallback) -> Self {
        self.on_artifact = Some(callback);
        self
    }

    /// Attach a completion callback.
    pub fn with_on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStatus {
    /// Number of live jobs in the registry.
    pub live_jobs: usize,
    /// Tasks waiting to start.
    pub pending_count: usize,
    /// Tasks currently transcoding.
    pub transcoding_count: usize,
    /// Tasks currently mirroring an artifact.
    pub mirroring_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_cancellation_flag_and_signal() {
        let job = Job::new();
        let mut rx = job.cancel_signal();
        assert!(!job.is_cancelled());

        job.cancel();
        assert!(job.is_cancelled());
        assert!(rx.recv().await.is_ok());

        // Idempotent
        job.cancel();
        assert!(job.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_signal_is_buffered() {
        let job = Job::new();
        let mut rx = job.cancel_signal();

        // Signal sent while nobody polls must not be lost
        job.cancel();
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::TaskNotFound("task-1".to_string());
        assert_eq!(err.to_string(), "task not found: task-1");
    }
}
