//! Collaborator traits for the message bus and event signing.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{EventTemplate, Filter, SignedEvent};

/// Errors surfaced by the message-bus collaborator.
#[derive(Debug, Error)]
pub enum BusError {
    /// No target relay could be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A relay refused or dropped the published event.
    #[error("publish rejected: {0}")]
    PublishRejected(String),

    /// Opening a subscription failed.
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),

    /// The bus closed while an operation was in flight.
    #[error("bus closed")]
    Closed,
}

/// Errors surfaced by the identity collaborator.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The signer refused to sign the event.
    #[error("signing rejected: {0}")]
    Rejected(String),

    /// The signing backend is unavailable.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// A live subscription to matching events.
///
/// Events arrive on an internal channel; dropping the subscription (or
/// calling [`close`](Subscription::close)) tears it down on the bus side.
#[derive(Debug)]
pub struct Subscription {
    /// Bus-assigned subscription id.
    pub id: String,
    receiver: mpsc::Receiver<SignedEvent>,
}

impl Subscription {
    /// Create a subscription from its id and event channel.
    pub fn new(id: impl Into<String>, receiver: mpsc::Receiver<SignedEvent>) -> Self {
        Self {
            id: id.into(),
            receiver,
        }
    }

    /// Receive the next matching event; `None` once the bus ends the stream.
    pub async fn recv(&mut self) -> Option<SignedEvent> {
        self.receiver.recv().await
    }

    /// Tear the subscription down.
    pub fn close(mut self) {
        self.receiver.close();
    }
}

impl futures::Stream for Subscription {
    type Item = SignedEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// The publish/subscribe/query surface of the message bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a signed event to the given targets.
    async fn publish(&self, targets: &[String], event: &SignedEvent) -> Result<(), BusError>;

    /// One-shot query: return the events currently known to the targets
    /// that match the filter. Callers apply their own timeout.
    async fn query(&self, targets: &[String], filter: Filter) -> Result<Vec<SignedEvent>, BusError>;

    /// Open a standing subscription for events matching the filter.
    async fn subscribe(&self, targets: &[String], filter: Filter)
        -> Result<Subscription, BusError>;
}

/// The identity collaborator: owns the keypair, signs event templates.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Public key of the identity, as carried in event author fields.
    fn public_key(&self) -> String;

    /// Sign a template, producing the wire event (id assigned here).
    async fn sign(&self, template: EventTemplate) -> Result<SignedEvent, SignerError>;
}
