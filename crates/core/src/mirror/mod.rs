//! Storage mirroring boundary.
//!
//! Copies finished artifacts to the user's own storage. The actual client
//! (blob uploads, server negotiation) is an external collaborator; the
//! orchestrator only needs the [`Mirror`] seam and treats every failure
//! here as non-fatal.

mod error;
mod traits;

pub use error::MirrorError;
pub use traits::{Mirror, MirroredArtifact};
