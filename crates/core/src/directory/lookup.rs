//! Capability-advertisement lookup against the bus.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::bus::{
    Filter, MessageBus, SignedEvent, SERVICE_ADVERTISEMENT_KIND, SERVICE_DISCRIMINATOR,
    TRANSCODE_REQUEST_KIND,
};

use super::types::{DirectoryError, WorkerProfile};

/// Structured advertisement payload; workers that publish plain tag pairs
/// instead are handled by the fallback path.
#[derive(Debug, Deserialize)]
struct AdvertisementPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    about: Option<String>,
}

/// Resolves transcode workers from capability advertisements.
#[derive(Clone)]
pub struct WorkerDirectory {
    bus: Arc<dyn MessageBus>,
    timeout: Duration,
}

impl WorkerDirectory {
    /// Create a directory with the given discovery timeout.
    pub fn new(bus: Arc<dyn MessageBus>, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    /// Find a worker advertising the transcode service on the given relays.
    ///
    /// Takes the first matching advertisement. Hard timeout; no retry.
    pub async fn lookup(&self, read_targets: &[String]) -> Result<WorkerProfile, DirectoryError> {
        let filter = Filter::new()
            .with_kind(SERVICE_ADVERTISEMENT_KIND)
            .with_tag("k", TRANSCODE_REQUEST_KIND.to_string())
            .with_tag("t", SERVICE_DISCRIMINATOR)
            .with_limit(1);

        let events = tokio::time::timeout(self.timeout, self.bus.query(read_targets, filter))
            .await
            .map_err(|_| DirectoryError::Timeout)??;

        let event = events.first().ok_or(DirectoryError::NoWorkerFound)?;
        let profile = Self::parse_advertisement(event);
        debug!(worker_id = %profile.worker_id, name = ?profile.name, "resolved transcode worker");
        Ok(profile)
    }

    /// Parse an advertisement: structured payload first, tag pairs as fallback.
    fn parse_advertisement(event: &SignedEvent) -> WorkerProfile {
        match serde_json::from_str::<AdvertisementPayload>(&event.content) {
            Ok(payload) => WorkerProfile {
                worker_id: event.pubkey.clone(),
                name: payload.name,
                about: payload.about,
            },
            Err(_) => WorkerProfile {
                worker_id: event.pubkey.clone(),
                name: event.tag_value("name").map(str::to_string),
                about: event.tag_value("about").map(str::to_string),
            },
        }
    }
}
