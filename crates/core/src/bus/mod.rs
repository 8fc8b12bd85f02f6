//! Message-bus event model and collaborator traits.
//!
//! The bus itself (relay connections, reconnect policy, fan-out) is an
//! external collaborator; this module defines the event shapes the
//! orchestrator produces and consumes plus the `MessageBus`/`Signer` seams
//! it talks through.

mod traits;
mod types;

pub use traits::{BusError, MessageBus, Signer, SignerError, Subscription};
pub use types::{
    EventTemplate, Filter, SignedEvent, Tag, JOB_FEEDBACK_KIND, SERVICE_ADVERTISEMENT_KIND,
    SERVICE_DISCRIMINATOR, TRANSCODE_REQUEST_KIND, TRANSCODE_RESULT_KIND,
};
