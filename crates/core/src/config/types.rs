use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub relays: RelayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Relay targets for the message bus.
///
/// Reads cover discovery and progress/result subscriptions; writes carry
/// job requests (and are echoed into the request's relays tag so the
/// worker knows where to answer).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

/// Task store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelay.db")
}
