//! Mock message bus for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::bus::{BusError, Filter, MessageBus, SignedEvent, Subscription};

/// A recorded publish for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    /// Targets the event was published to.
    pub targets: Vec<String>,
    /// The event itself.
    pub event: SignedEvent,
}

type PublishHandler = Box<dyn Fn(&SignedEvent) -> Vec<SignedEvent> + Send + Sync>;

struct MockSubscriber {
    filter: Filter,
    sender: mpsc::Sender<SignedEvent>,
}

/// Mock implementation of the [`MessageBus`] trait.
///
/// Behaves like a relay with storage: emitted events are kept and replayed
/// to later queries and subscriptions, so tests do not race the
/// orchestrator's subscribe call.
///
/// # Example
///
/// ```rust,ignore
/// let bus = MockBus::new();
///
/// // Script the worker: answer every published request with a result
/// bus.set_publish_handler(|request| vec![fixtures::result(
///     "worker-pk", &request.id, "https://cdn.example.com/out.mp4",
/// )]).await;
///
/// // Later: assert on what was published
/// let published = bus.published().await;
/// assert_eq!(published.len(), 1);
/// ```
pub struct MockBus {
    events: Arc<RwLock<Vec<SignedEvent>>>,
    published: Arc<RwLock<Vec<RecordedPublish>>>,
    subscribers: Arc<RwLock<Vec<MockSubscriber>>>,
    publish_handler: Arc<RwLock<Option<PublishHandler>>>,
    next_error: Arc<RwLock<Option<BusError>>>,
    query_delay: Arc<RwLock<Option<std::time::Duration>>>,
    queries_made: Arc<RwLock<u32>>,
    subscriptions_opened: Arc<RwLock<u32>>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBus {
    /// Create a new mock bus.
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            published: Arc::new(RwLock::new(Vec::new())),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            publish_handler: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            query_delay: Arc::new(RwLock::new(None)),
            queries_made: Arc::new(RwLock::new(0)),
            subscriptions_opened: Arc::new(RwLock::new(0)),
        }
    }

    /// Store an event and deliver it to matching live subscriptions.
    pub async fn emit(&self, event: SignedEvent) {
        self.events.write().await.push(event.clone());

        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|sub| !sub.sender.is_closed());
        for sub in subscribers.iter() {
            if sub.filter.matches(&event) {
                let _ = sub.sender.try_send(event.clone());
            }
        }
    }

    /// Script automatic worker responses: the handler runs on every
    /// publish and its events are emitted back through the bus.
    pub async fn set_publish_handler<F>(&self, handler: F)
    where
        F: Fn(&SignedEvent) -> Vec<SignedEvent> + Send + Sync + 'static,
    {
        *self.publish_handler.write().await = Some(Box::new(handler));
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: BusError) {
        *self.next_error.write().await = Some(error);
    }

    /// All recorded publishes.
    pub async fn published(&self) -> Vec<RecordedPublish> {
        self.published.read().await.clone()
    }

    /// Recorded publishes of the given kind.
    pub async fn published_of_kind(&self, kind: u32) -> Vec<SignedEvent> {
        self.published
            .read()
            .await
            .iter()
            .filter(|p| p.event.kind == kind)
            .map(|p| p.event.clone())
            .collect()
    }

    /// Number of currently live subscriptions.
    pub async fn live_subscriptions(&self) -> usize {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|sub| !sub.sender.is_closed());
        subscribers.len()
    }

    /// Total subscriptions ever opened.
    pub async fn subscriptions_opened(&self) -> u32 {
        *self.subscriptions_opened.read().await
    }

    /// Total one-shot queries served.
    pub async fn queries_made(&self) -> u32 {
        *self.queries_made.read().await
    }

    /// Delay every query by the given duration (to exercise timeouts).
    pub async fn set_query_delay(&self, delay: std::time::Duration) {
        *self.query_delay.write().await = Some(delay);
    }

    async fn take_error(&self) -> Option<BusError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl MessageBus for MockBus {
    async fn publish(&self, targets: &[String], event: &SignedEvent) -> Result<(), BusError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.published.write().await.push(RecordedPublish {
            targets: targets.to_vec(),
            event: event.clone(),
        });

        let responses = {
            let handler = self.publish_handler.read().await;
            handler.as_ref().map(|h| h(event)).unwrap_or_default()
        };
        for response in responses {
            self.emit(response).await;
        }

        Ok(())
    }

    async fn query(
        &self,
        _targets: &[String],
        filter: Filter,
    ) -> Result<Vec<SignedEvent>, BusError> {
        *self.queries_made.write().await += 1;

        let delay = *self.query_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let events = self.events.read().await;
        let mut matching: Vec<SignedEvent> = events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn subscribe(
        &self,
        _targets: &[String],
        filter: Filter,
    ) -> Result<Subscription, BusError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let (sender, receiver) = mpsc::channel(64);

        // Replay stored events so subscribers opened after an emit still
        // see it, the way relays replay stored events
        for event in self.events.read().await.iter() {
            if filter.matches(event) {
                let _ = sender.try_send(event.clone());
            }
        }

        self.subscribers
            .write()
            .await
            .push(MockSubscriber { filter, sender });

        let mut opened = self.subscriptions_opened.write().await;
        *opened += 1;
        Ok(Subscription::new(format!("mock-sub-{}", *opened), receiver))
    }
}
