//! Mock event signer for testing.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::bus::{EventTemplate, SignedEvent, Signer, SignerError};

/// Mock implementation of the [`Signer`] trait.
///
/// Event ids are derived deterministically from the template contents, so
/// the same template always signs to the same id.
pub struct MockSigner {
    pubkey: String,
    next_error: Arc<RwLock<Option<SignerError>>>,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSigner {
    /// Create a signer with the default test identity.
    pub fn new() -> Self {
        Self::with_public_key("mock-user-pk")
    }

    /// Create a signer with a specific identity.
    pub fn with_public_key(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Configure the next sign call to fail with the given error.
    pub async fn set_next_error(&self, error: SignerError) {
        *self.next_error.write().await = Some(error);
    }

    fn derive_id(&self, template: &EventTemplate) -> String {
        let serialized = serde_json::json!([
            self.pubkey,
            template.kind,
            template.created_at.timestamp_millis(),
            template.tags,
            template.content,
        ])
        .to_string();

        let digest = Sha256::digest(serialized.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn public_key(&self) -> String {
        self.pubkey.clone()
    }

    async fn sign(&self, template: EventTemplate) -> Result<SignedEvent, SignerError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let id = self.derive_id(&template);
        let sig = format!("mock-sig-{}", &id[..16]);

        Ok(SignedEvent {
            id,
            pubkey: self.pubkey.clone(),
            sig,
            kind: template.kind,
            content: template.content,
            tags: template.tags,
            created_at: template.created_at,
        })
    }
}
