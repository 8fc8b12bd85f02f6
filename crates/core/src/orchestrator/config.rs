//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the transcode orchestrator.
///
/// The defaults are the protocol constants; deployments mostly tune the
/// sweep window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long worker discovery may take before failing (seconds).
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,

    /// How long to wait for a job's terminal event (seconds).
    #[serde(default = "default_result_timeout")]
    pub result_timeout_secs: u64,

    /// Window for the one-shot existing-result check on resume (seconds).
    #[serde(default = "default_existing_result_timeout")]
    pub existing_result_timeout_secs: u64,

    /// Tasks older than this are expired instead of resumed (hours).
    #[serde(default = "default_resume_expiry")]
    pub resume_expiry_hours: u64,

    /// Completed/cancelled tasks older than this are swept (days).
    #[serde(default = "default_sweep_max_age")]
    pub sweep_max_age_days: u64,
}

fn default_discovery_timeout() -> u64 {
    10
}

fn default_result_timeout() -> u64 {
    600 // 10 minutes
}

fn default_existing_result_timeout() -> u64 {
    5
}

fn default_resume_expiry() -> u64 {
    12
}

fn default_sweep_max_age() -> u64 {
    7
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: default_discovery_timeout(),
            result_timeout_secs: default_result_timeout(),
            existing_result_timeout_secs: default_existing_result_timeout(),
            resume_expiry_hours: default_resume_expiry(),
            sweep_max_age_days: default_sweep_max_age(),
        }
    }
}
