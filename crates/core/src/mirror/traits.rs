//! Trait definition for the mirror collaborator.

use async_trait::async_trait;

use super::error::MirrorError;

/// An artifact copy that landed on the user's own storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredArtifact {
    /// Where the mirrored copy can be fetched.
    pub url: String,
    /// Content hash, when the storage target reported one.
    pub sha256: Option<String>,
    /// Size in bytes, when the storage target reported one.
    pub size_bytes: Option<u64>,
}

/// A mirror that can copy a remote artifact to the user's storage.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Copy the artifact at `url` to the user's storage.
    ///
    /// `sha256` and `size_bytes` are passed through when known so the
    /// storage side can verify or deduplicate.
    async fn mirror(
        &self,
        url: &str,
        sha256: Option<&str>,
        size_bytes: Option<u64>,
    ) -> Result<MirroredArtifact, MirrorError>;
}
