//! The job protocol client implementation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::bus::{
    Filter, MessageBus, SignedEvent, Signer, JOB_FEEDBACK_KIND, TRANSCODE_RESULT_KIND,
};
use crate::task::{Artifact, Quality};

use super::error::JobError;
use super::types::{build_request, parse_result_event, JobProgress, ProgressSink};

/// Submits signed job requests and follows their progress/result events.
#[derive(Clone)]
pub struct JobClient {
    bus: Arc<dyn MessageBus>,
    signer: Arc<dyn Signer>,
    result_timeout: Duration,
    existing_result_timeout: Duration,
}

impl JobClient {
    /// Create a client with the given terminal-event and resume-query windows.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        signer: Arc<dyn Signer>,
        result_timeout: Duration,
        existing_result_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            signer,
            result_timeout,
            existing_result_timeout,
        }
    }

    /// Build, sign, and publish one job request. Returns the event id,
    /// which correlates all subsequent progress/result events.
    pub async fn submit(
        &self,
        worker_id: &str,
        input_url: &str,
        quality: Quality,
        write_targets: &[String],
    ) -> Result<String, JobError> {
        let template = build_request(input_url, worker_id, quality, write_targets);
        let event = self.signer.sign(template).await?;
        self.bus
            .publish(write_targets, &event)
            .await
            .map_err(JobError::Publish)?;

        debug!(request_id = %event.id, worker_id, quality = %quality, "job request published");
        Ok(event.id)
    }

    /// Wait for the terminal event of a submitted job.
    ///
    /// Progress events feed `progress`; a result event resolves with the
    /// parsed artifact. A signal on `cancel` unsubscribes and resolves with
    /// [`JobError::Cancelled`] immediately; no further events are processed.
    pub async fn await_result(
        &self,
        request_id: &str,
        worker_id: &str,
        read_targets: &[String],
        quality: Quality,
        known_duration: Option<f64>,
        progress: &dyn ProgressSink,
        cancel: &mut broadcast::Receiver<()>,
    ) -> Result<Artifact, JobError> {
        let filter = Filter::new()
            .with_kind(JOB_FEEDBACK_KIND)
            .with_kind(TRANSCODE_RESULT_KIND)
            .with_author(worker_id)
            .with_event(request_id);

        let mut sub = self
            .bus
            .subscribe(read_targets, filter)
            .await
            .map_err(JobError::Subscription)?;

        let deadline = tokio::time::sleep(self.result_timeout);
        tokio::pin!(deadline);

        loop {
            let event = tokio::select! {
                _ = &mut deadline => {
                    sub.close();
                    return Err(JobError::ResultTimeout);
                }
                _ = cancel.recv() => {
                    sub.close();
                    return Err(JobError::Cancelled);
                }
                event = sub.recv() => match event {
                    Some(event) => event,
                    None => return Err(JobError::Subscription(crate::bus::BusError::Closed)),
                },
            };

            match event.kind {
                JOB_FEEDBACK_KIND => match Self::feedback_status(&event) {
                    "error" => {
                        sub.close();
                        let message = Self::feedback_message(&event)
                            .unwrap_or_else(|| "worker reported an unspecified error".to_string());
                        return Err(JobError::WorkerReported(message));
                    }
                    "processing" | "partial" => {
                        progress.update(Self::feedback_progress(&event)).await;
                    }
                    other => {
                        debug!(request_id, status = other, "ignoring unknown feedback status");
                    }
                },
                TRANSCODE_RESULT_KIND => {
                    sub.close();
                    return parse_result_event(&event, quality, known_duration);
                }
                other => {
                    warn!(request_id, kind = other, "unexpected event kind on job subscription");
                }
            }
        }
    }

    /// One-shot check for a result that may already exist (used on resume,
    /// when the process went down with a request in flight). Absence of a
    /// result is `None`, not an error.
    pub async fn query_existing_result(
        &self,
        request_id: &str,
        worker_id: &str,
        read_targets: &[String],
        quality: Quality,
        known_duration: Option<f64>,
    ) -> Result<Option<Artifact>, JobError> {
        let filter = Filter::new()
            .with_kind(TRANSCODE_RESULT_KIND)
            .with_author(worker_id)
            .with_event(request_id)
            .with_limit(1);

        let events = match tokio::time::timeout(
            self.existing_result_timeout,
            self.bus.query(read_targets, filter),
        )
        .await
        {
            Ok(result) => result.map_err(JobError::Query)?,
            Err(_) => return Ok(None),
        };

        match events.first() {
            Some(event) => parse_result_event(event, quality, known_duration).map(Some),
            None => Ok(None),
        }
    }

    fn feedback_status(event: &SignedEvent) -> &str {
        event.tag_value("status").unwrap_or("")
    }

    fn feedback_message(event: &SignedEvent) -> Option<String> {
        let from_tag = event.tag_value("content").map(str::to_string);
        from_tag.or_else(|| {
            let trimmed = event.content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    }

    /// Feedback content is either a bare percentage or a status message.
    fn feedback_progress(event: &SignedEvent) -> JobProgress {
        let eta_seconds = event.tag_value("eta").and_then(|v| v.parse().ok());

        match Self::feedback_message(event) {
            Some(text) => match text.trim().trim_end_matches('%').parse::<f32>() {
                Ok(pct) => JobProgress {
                    message: None,
                    percentage: Some(pct.clamp(0.0, 100.0)),
                    eta_seconds,
                },
                Err(_) => JobProgress {
                    message: Some(text),
                    percentage: None,
                    eta_seconds,
                },
            },
            None => JobProgress {
                message: None,
                percentage: None,
                eta_seconds,
            },
        }
    }
}
