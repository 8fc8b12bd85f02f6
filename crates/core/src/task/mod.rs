//! Durable task registry.
//!
//! A [`Task`] is the resumable unit of work representing "transcode this
//! input into these qualities". Tasks survive restarts; the orchestrator is
//! their only writer and persists after every milestone.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTaskStore;
pub use store::{TaskError, TaskPatch, TaskStore};
pub use types::{Artifact, Quality, Task, TaskFailure, TaskStatus, TranscodePhase, TranscodeState};
