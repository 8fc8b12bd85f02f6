//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external collaborator
//! traits, allowing full pipeline testing without relays, a signer daemon,
//! or storage servers.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelay_core::testing::{fixtures, MockBus, MockMirror, MockSigner};
//!
//! let bus = MockBus::new();
//! let signer = MockSigner::new();
//! let mirror = MockMirror::new();
//!
//! // Make a worker discoverable and script its answers
//! bus.emit(fixtures::advertisement("worker-pk", "Transcoder")).await;
//! bus.set_publish_handler(|request| {
//!     vec![fixtures::result("worker-pk", &request.id, "https://cdn.example.com/out.mp4")]
//! }).await;
//! ```

mod mock_bus;
mod mock_mirror;
mod mock_signer;

pub use mock_bus::{MockBus, RecordedPublish};
pub use mock_mirror::MockMirror;
pub use mock_signer::MockSigner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::bus::{
        SignedEvent, Tag, JOB_FEEDBACK_KIND, SERVICE_ADVERTISEMENT_KIND, SERVICE_DISCRIMINATOR,
        TRANSCODE_REQUEST_KIND, TRANSCODE_RESULT_KIND,
    };

    fn signed(worker_id: &str, kind: u32, content: String, tags: Vec<Tag>) -> SignedEvent {
        let id = uuid::Uuid::new_v4().to_string();
        SignedEvent {
            sig: format!("fixture-sig-{}", &id[..8]),
            id,
            pubkey: worker_id.to_string(),
            kind,
            content,
            tags,
            created_at: Utc::now(),
        }
    }

    /// A capability advertisement for the transcode service.
    pub fn advertisement(worker_id: &str, name: &str) -> SignedEvent {
        signed(
            worker_id,
            SERVICE_ADVERTISEMENT_KIND,
            format!(r#"{{"name":"{}","about":"test transcode worker"}}"#, name),
            vec![
                Tag::pair("k", TRANSCODE_REQUEST_KIND.to_string()),
                Tag::pair("t", SERVICE_DISCRIMINATOR),
            ],
        )
    }

    /// A worker feedback event referencing a request.
    pub fn feedback(worker_id: &str, request_id: &str, status: &str, content: &str) -> SignedEvent {
        signed(
            worker_id,
            JOB_FEEDBACK_KIND,
            content.to_string(),
            vec![Tag::pair("e", request_id), Tag::pair("status", status)],
        )
    }

    /// A feedback event with an ETA tag.
    pub fn feedback_with_eta(
        worker_id: &str,
        request_id: &str,
        status: &str,
        content: &str,
        eta_seconds: u64,
    ) -> SignedEvent {
        let mut event = feedback(worker_id, request_id, status, content);
        event.tags.push(Tag::pair("eta", eta_seconds.to_string()));
        event
    }

    /// A minimal structured result for a request.
    pub fn result(worker_id: &str, request_id: &str, url: &str) -> SignedEvent {
        result_with_payload(
            worker_id,
            request_id,
            &format!(
                r#"{{"url":"{}","mimetype":"video/mp4; codecs=\"avc1.64001f, mp4a.40.2\"","duration":60.0,"size_bytes":6000000}}"#,
                url
            ),
        )
    }

    /// A result event with an explicit payload.
    pub fn result_with_payload(worker_id: &str, request_id: &str, payload: &str) -> SignedEvent {
        signed(
            worker_id,
            TRANSCODE_RESULT_KIND,
            payload.to_string(),
            vec![Tag::pair("e", request_id)],
        )
    }
}
