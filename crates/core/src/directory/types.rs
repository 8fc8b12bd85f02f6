//! Types for worker directory lookup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::BusError;

/// A worker resolved from a capability advertisement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerProfile {
    /// Public key of the worker; job requests are addressed to it.
    pub worker_id: String,
    /// Display name, when advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Service description, when advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

/// Errors that can occur during worker discovery.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No advertisement arrived within the discovery window.
    #[error("worker discovery timed out")]
    Timeout,

    /// The query returned, but no worker advertises the service.
    #[error("no worker found for the transcode service")]
    NoWorkerFound,

    /// Bus error while querying.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}
