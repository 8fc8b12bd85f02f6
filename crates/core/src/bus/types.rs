//! Event and filter types for the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of job-request events for the transcode service.
pub const TRANSCODE_REQUEST_KIND: u32 = 5204;

/// Kind of result events; always request kind + 1000.
pub const TRANSCODE_RESULT_KIND: u32 = TRANSCODE_REQUEST_KIND + 1000;

/// Kind of progress/feedback events emitted by workers mid-job.
pub const JOB_FEEDBACK_KIND: u32 = 7000;

/// Kind of capability-advertisement events published by workers.
pub const SERVICE_ADVERTISEMENT_KIND: u32 = 31990;

/// Discriminator tag value advertised by workers offering this service.
pub const SERVICE_DISCRIMINATOR: &str = "video-transcode";

/// A single event tag: a key followed by zero or more values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Create a tag from its parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Create a simple key/value tag.
    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![key.into(), value.into()])
    }

    /// The tag key (first element).
    pub fn key(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The primary tag value (second element).
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    /// All values after the key.
    pub fn values(&self) -> &[String] {
        if self.0.is_empty() {
            &[]
        } else {
            &self.0[1..]
        }
    }
}

/// An unsigned event, ready to be handed to a [`Signer`](super::Signer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventTemplate {
    /// Event kind.
    pub kind: u32,
    /// Payload content (format depends on the kind).
    pub content: String,
    /// Event tags.
    pub tags: Vec<Tag>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl EventTemplate {
    /// Create a template with the given kind and content, stamped now.
    pub fn new(kind: u32, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }
}

/// A signed event as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedEvent {
    /// Event id; doubles as the correlation id for request events.
    pub id: String,
    /// Public key of the author.
    pub pubkey: String,
    /// Signature over the serialized event.
    pub sig: String,
    /// Event kind.
    pub kind: u32,
    /// Payload content.
    pub content: String,
    /// Event tags.
    pub tags: Vec<Tag>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SignedEvent {
    /// First value of the first tag with the given key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key() == Some(key))
            .and_then(Tag::value)
    }

    /// Values of every tag with the given key.
    pub fn tag_values<'a>(&'a self, key: &str) -> Vec<&'a str> {
        self.tags
            .iter()
            .filter(|t| t.key() == Some(key))
            .filter_map(Tag::value)
            .collect()
    }

    /// Whether this event references the given event id via an "e" tag.
    pub fn references(&self, event_id: &str) -> bool {
        self.tag_values("e").contains(&event_id)
    }
}

/// Subscription/query filter.
///
/// All set fields must match; within a field, any listed value matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Match any of these kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    /// Match any of these author pubkeys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Match events referencing any of these event ids ("e" tags).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    /// Match events carrying any of these key/value tag pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<(String, String)>,
    /// Maximum number of events to return from a one-shot query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the given kind.
    pub fn with_kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Match events authored by the given pubkey.
    pub fn with_author(mut self, pubkey: impl Into<String>) -> Self {
        self.authors.push(pubkey.into());
        self
    }

    /// Match events referencing the given event id.
    pub fn with_event(mut self, event_id: impl Into<String>) -> Self {
        self.events.push(event_id.into());
        self
    }

    /// Match events carrying the given tag pair.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Set the query result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether the given event satisfies this filter.
    pub fn matches(&self, event: &SignedEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&event.pubkey) {
            return false;
        }
        if !self.events.is_empty() && !self.events.iter().any(|id| event.references(id)) {
            return false;
        }
        for (key, value) in &self.tags {
            if !event.tag_values(key).contains(&value.as_str()) {
                return false;
            }
        }
        true
    }
}
