//! Mock storage mirror for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::mirror::{Mirror, MirrorError, MirroredArtifact};

/// Mock implementation of the [`Mirror`] trait.
///
/// Rewrites mirrored URLs under a fixed base so tests can tell mirrored
/// artifacts from unmirrored ones.
pub struct MockMirror {
    base_url: String,
    mirrored: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<MirrorError>>>,
    fail_all: Arc<RwLock<bool>>,
}

impl Default for MockMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMirror {
    /// Create a mirror storing under the default test base URL.
    pub fn new() -> Self {
        Self {
            base_url: "https://storage.example.com/mirror".to_string(),
            mirrored: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            fail_all: Arc::new(RwLock::new(false)),
        }
    }

    /// Source URLs mirrored so far.
    pub async fn mirrored_urls(&self) -> Vec<String> {
        self.mirrored.read().await.clone()
    }

    /// Configure the next mirror call to fail with the given error.
    pub async fn set_next_error(&self, error: MirrorError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every mirror call fail until turned off again.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }
}

#[async_trait]
impl Mirror for MockMirror {
    async fn mirror(
        &self,
        url: &str,
        sha256: Option<&str>,
        size_bytes: Option<u64>,
    ) -> Result<MirroredArtifact, MirrorError> {
        if *self.fail_all.read().await {
            return Err(MirrorError::UploadRejected("mirror disabled".to_string()));
        }
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.mirrored.write().await.push(url.to_string());

        let file_name = url.rsplit('/').next().unwrap_or("artifact");
        Ok(MirroredArtifact {
            url: format!("{}/{}", self.base_url, file_name),
            sha256: sha256.map(str::to_string),
            size_bytes,
        })
    }
}
