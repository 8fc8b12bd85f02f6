//! Core task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requested output resolution label, mapped to a fixed pixel-dimension pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quality {
    #[serde(rename = "240p")]
    Q240p,
    #[serde(rename = "360p")]
    Q360p,
    #[serde(rename = "480p")]
    Q480p,
    #[serde(rename = "720p")]
    Q720p,
    #[serde(rename = "1080p")]
    Q1080p,
    #[serde(rename = "2160p")]
    Q2160p,
}

impl Quality {
    /// The wire label for this quality (e.g. "720p").
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Q240p => "240p",
            Quality::Q360p => "360p",
            Quality::Q480p => "480p",
            Quality::Q720p => "720p",
            Quality::Q1080p => "1080p",
            Quality::Q2160p => "2160p",
        }
    }

    /// Output pixel dimensions as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Quality::Q240p => (426, 240),
            Quality::Q360p => (640, 360),
            Quality::Q480p => (854, 480),
            Quality::Q720p => (1280, 720),
            Quality::Q1080p => (1920, 1080),
            Quality::Q2160p => (3840, 2160),
        }
    }

    /// Dimensions formatted as "WxH".
    pub fn dimension_label(&self) -> String {
        let (w, h) = self.dimensions();
        format!("{}x{}", w, h)
    }

    /// Parse a wire label back into a quality.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "240p" => Some(Quality::Q240p),
            "360p" => Some(Quality::Q360p),
            "480p" => Some(Quality::Q480p),
            "720p" => Some(Quality::Q720p),
            "1080p" => Some(Quality::Q1080p),
            "2160p" => Some(Quality::Q2160p),
            _ => None,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One finished transcode output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    /// Where the output can be fetched.
    pub url: String,
    /// Pixel dimensions as "WxH".
    pub dimension: String,
    /// Output size in bytes, when the worker reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Output duration in seconds.
    pub duration_seconds: f64,
    /// Bitrate in bits per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    /// Video codec string, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    /// Audio codec string, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// The quality label this artifact was produced for.
    pub quality_label: String,
}

/// A task-fatal failure, kept on the task record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFailure {
    /// Human-readable message.
    pub message: String,
    /// Whether a user-initiated retry is worth attempting.
    pub retryable: bool,
}

impl TaskFailure {
    /// Create a failure record.
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
        }
    }
}

/// Phase within the transcoding pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranscodePhase {
    /// Looking up a worker on the bus.
    Discovering,
    /// A job request is in flight with a worker.
    Transcoding,
    /// Copying a finished artifact to the user's storage.
    Mirroring,
}

/// Transcoding progress for a task, persisted on every milestone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeState {
    /// Current pipeline phase.
    pub phase: TranscodePhase,
    /// Worker identity, once discovery resolved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// URL of the uploaded input the worker reads from.
    pub input_url: String,
    /// Duration of the input in seconds, when known at submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_duration_seconds: Option<f64>,
    /// Correlation id of the in-flight job request, if one was submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Requested qualities, in processing order. Immutable once set.
    pub resolution_queue: Vec<Quality>,
    /// Quality currently being processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_quality: Option<Quality>,
    /// Qualities finished so far, in completion order.
    #[serde(default)]
    pub completed_qualities: Vec<Quality>,
    /// Artifacts finished so far, 1:1 with `completed_qualities`.
    #[serde(default)]
    pub completed_artifacts: Vec<Artifact>,
    /// Latest worker progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Latest worker progress percentage (0-100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f32>,
    /// Latest worker ETA in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    /// When transcoding started; drives the resume-expiry window.
    pub started_at: DateTime<Utc>,
}

impl TranscodeState {
    /// Create the initial state for a fresh transcode.
    pub fn new(input_url: impl Into<String>, resolution_queue: Vec<Quality>) -> Self {
        Self {
            phase: TranscodePhase::Discovering,
            worker_id: None,
            input_url: input_url.into(),
            original_duration_seconds: None,
            request_id: None,
            resolution_queue,
            current_quality: None,
            completed_qualities: Vec::new(),
            completed_artifacts: Vec::new(),
            message: None,
            percentage: None,
            eta_seconds: None,
            started_at: Utc::now(),
        }
    }

    /// Set the known input duration.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.original_duration_seconds = Some(seconds);
        self
    }

    /// Qualities from the queue not yet completed, in queue order.
    pub fn remaining_qualities(&self) -> Vec<Quality> {
        self.resolution_queue
            .iter()
            .filter(|q| !self.completed_qualities.contains(q))
            .copied()
            .collect()
    }

    /// Record one finished quality and its artifact.
    pub fn record_completed(&mut self, quality: Quality, artifact: Artifact) {
        self.completed_qualities.push(quality);
        self.completed_artifacts.push(artifact);
        self.current_quality = None;
        self.request_id = None;
        self.message = None;
        self.percentage = None;
        self.eta_seconds = None;
    }

    /// Drop the in-flight fields (on cancellation).
    pub fn clear_in_flight(&mut self) {
        self.current_quality = None;
        self.request_id = None;
        self.message = None;
        self.percentage = None;
        self.eta_seconds = None;
    }

    /// Whether `completed_qualities` is a prefix of `resolution_queue`.
    pub fn is_prefix_consistent(&self) -> bool {
        self.completed_qualities.len() <= self.resolution_queue.len()
            && self
                .completed_qualities
                .iter()
                .zip(self.resolution_queue.iter())
                .all(|(done, queued)| done == queued)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Transcoding,
    Mirroring,
    Complete,
    Error,
    Cancelled,
}

impl TaskStatus {
    /// Stable string form, used as the store's status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Uploading => "uploading",
            TaskStatus::Transcoding => "transcoding",
            TaskStatus::Mirroring => "mirroring",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the store's status column back.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "uploading" => Some(TaskStatus::Uploading),
            "transcoding" => Some(TaskStatus::Transcoding),
            "mirroring" => Some(TaskStatus::Mirroring),
            "complete" => Some(TaskStatus::Complete),
            "error" => Some(TaskStatus::Error),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the task has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Complete | TaskStatus::Error | TaskStatus::Cancelled
        )
    }

    /// Whether a cold-start sweep should pick the task up.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending
                | TaskStatus::Uploading
                | TaskStatus::Transcoding
                | TaskStatus::Mirroring
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One user-initiated transcode request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Stable id, unchanged across resume.
    pub id: String,
    /// The upload draft this task belongs to.
    pub draft_id: String,
    /// Display title of the upload.
    pub title: String,
    /// Lifecycle status.
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the task reaches `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the task reaches `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
    /// Transcoding progress, present once transcoding starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcode: Option<TranscodeState>,
}
