//! Prometheus metrics for core components.
//!
//! This module provides metrics for the orchestrator pipeline: job
//! submissions, task outcomes, and the mirror step.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter};

/// Job requests published to workers.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelay_jobs_submitted_total",
        "Total transcode job requests published",
    )
    .unwrap()
});

/// Tasks that reached the complete state.
pub static TASKS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelay_tasks_completed_total",
        "Total tasks completed successfully",
    )
    .unwrap()
});

/// Tasks that reached the error state.
pub static TASKS_FAILED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("reelay_tasks_failed_total", "Total tasks that failed").unwrap());

/// Tasks that were cancelled.
pub static TASKS_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelay_tasks_cancelled_total",
        "Total tasks that were cancelled",
    )
    .unwrap()
});

/// Mirror-step failures (non-fatal; the original artifact URL is kept).
pub static MIRROR_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelay_mirror_failures_total",
        "Total artifact mirror failures",
    )
    .unwrap()
});

/// Wall-clock duration of one job request/response cycle, per quality.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelay_job_duration_seconds",
            "Duration of one transcode job cycle",
        )
        .buckets(vec![
            5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 3600.0,
        ]),
        &["quality"],
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(TASKS_COMPLETED.clone()),
        Box::new(TASKS_FAILED.clone()),
        Box::new(TASKS_CANCELLED.clone()),
        Box::new(MIRROR_FAILURES.clone()),
        Box::new(JOB_DURATION.clone()),
    ]
}
