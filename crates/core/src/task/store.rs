//! Task storage trait.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::types::{Task, TaskFailure, TaskStatus, TranscodeState};

/// Error type for task store operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Partial update applied to a task.
///
/// Only the fields that were set are merged; every update bumps
/// `updated_at` and is persisted before the call returns.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<TaskFailure>,
    pub transcode: Option<TranscodeState>,
    pub clear_error: bool,
}

impl TaskPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the completion timestamp.
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Set the failure record.
    pub fn with_error(mut self, error: TaskFailure) -> Self {
        self.error = Some(error);
        self
    }

    /// Replace the transcode sub-record.
    pub fn with_transcode(mut self, state: TranscodeState) -> Self {
        self.transcode = Some(state);
        self
    }

    /// Drop a previous failure record (on user-initiated retry).
    pub fn clearing_error(mut self) -> Self {
        self.clear_error = true;
        self
    }
}

/// Trait for task storage backends.
///
/// Implementations must make every write durable before returning, so a
/// crash after a milestone update never loses more than that one update.
pub trait TaskStore: Send + Sync {
    /// Register a task for an upload draft. Idempotent: if a task already
    /// exists for `draft_id`, it is returned unchanged.
    fn register(&self, draft_id: &str, title: &str) -> Result<Task, TaskError>;

    /// Apply a partial update to a task, atomically per task id.
    fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, TaskError>;

    /// Get a task by id.
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError>;

    /// Permanently delete a task. Returns the deleted task if found.
    fn remove(&self, id: &str) -> Result<Task, TaskError>;

    /// Tasks a cold-start sweep should consider resuming.
    fn list_resumable(&self) -> Result<Vec<Task>, TaskError>;

    /// Count tasks with the given status.
    fn count(&self, status: TaskStatus) -> Result<i64, TaskError>;

    /// Delete completed/cancelled tasks untouched for longer than `max_age`.
    /// Returns the number of tasks deleted.
    fn sweep_completed(&self, max_age: Duration) -> Result<usize, TaskError>;
}
