//! Error types for the mirror boundary.

use thiserror::Error;

/// Errors that can occur while mirroring an artifact.
///
/// Never task-fatal: the orchestrator logs these and keeps the original
/// artifact URL.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The source artifact could not be fetched.
    #[error("failed to fetch source artifact: {0}")]
    FetchFailed(String),

    /// The storage target rejected the upload.
    #[error("storage target rejected the artifact: {0}")]
    UploadRejected(String),

    /// No storage target is configured or reachable.
    #[error("no storage target available")]
    NoTarget,
}
