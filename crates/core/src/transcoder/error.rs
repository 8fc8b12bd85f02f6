//! Error types for the job protocol client.

use thiserror::Error;

use crate::bus::{BusError, SignerError};

/// Errors that can occur during a job request/response cycle.
#[derive(Debug, Error)]
pub enum JobError {
    /// The identity collaborator refused to sign the request.
    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),

    /// Publishing the signed request failed.
    #[error("publish failed: {0}")]
    Publish(#[source] BusError),

    /// Opening the progress/result subscription failed.
    #[error("subscription failed: {0}")]
    Subscription(#[source] BusError),

    /// A one-shot result query failed.
    #[error("query failed: {0}")]
    Query(#[source] BusError),

    /// The worker reported a job failure.
    #[error("worker reported an error: {0}")]
    WorkerReported(String),

    /// No terminal event arrived within the result window.
    #[error("no transcode result within the allowed window")]
    ResultTimeout,

    /// The job was cancelled while waiting.
    #[error("job cancelled")]
    Cancelled,

    /// The worker's result payload could not be parsed.
    #[error("malformed worker result: {0}")]
    MalformedResult(String),
}

impl JobError {
    /// Whether a user-initiated retry is worth attempting.
    ///
    /// Worker-reported failures are deterministic; cancellation is not an
    /// error at all. Everything else is network-shaped.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::WorkerReported(_) | JobError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(JobError::ResultTimeout.is_retryable());
        assert!(JobError::Publish(BusError::Closed).is_retryable());
        assert!(JobError::MalformedResult("bad".into()).is_retryable());
        assert!(!JobError::WorkerReported("codec unsupported".into()).is_retryable());
        assert!(!JobError::Cancelled.is_retryable());
    }
}
