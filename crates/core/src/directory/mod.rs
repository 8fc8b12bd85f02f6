//! Worker directory lookup.
//!
//! Resolves a transcode worker by querying the bus for
//! capability-advertisement events. One shot, hard timeout, no retry;
//! retry policy belongs to the orchestrator.

mod lookup;
mod types;

pub use lookup::WorkerDirectory;
pub use types::{DirectoryError, WorkerProfile};
