//! Job protocol client.
//!
//! Runs exactly one request/response cycle with a worker for one
//! (task, quality) pair: build and sign the job request, publish it, then
//! follow progress and result events correlated to the request id.

mod client;
mod error;
mod types;

pub use client::JobClient;
pub use error::JobError;
pub use types::{build_request, parse_result_event, JobProgress, ProgressSink};
