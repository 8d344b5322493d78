//! Cross-instance propagation of cache-mode writes.
//!
//! Every cache-mode save publishes a [`SaveEvent`] carrying the *update*
//! payload (not the merged record) on a durable stream; each instance runs a
//! consumer that re-applies the payload locally, so concurrently connected
//! sessions converge. Delivery is at-least-once and merge is idempotent, so
//! duplicates are harmless.

pub mod consumer;
pub mod memory;
pub mod valkey;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub use consumer::EventDispatcher;

/// Closed set of propagation event kinds. The string forms are part of the
/// wire contract consumed by other instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveEventKind {
    CharacteristicsUpdated,
    CurrencyUpdated,
    StageUpdated,
    MetadataUpdated,
}

impl SaveEventKind {
    /// Wire name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CharacteristicsUpdated => "characteristics_updated",
            Self::CurrencyUpdated => "currency_updated",
            Self::StageUpdated => "stage_updated",
            Self::MetadataUpdated => "metadata_updated",
        }
    }

    /// Parse a wire name back into a kind.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "characteristics_updated" => Some(Self::CharacteristicsUpdated),
            "currency_updated" => Some(Self::CurrencyUpdated),
            "stage_updated" => Some(Self::StageUpdated),
            "metadata_updated" => Some(Self::MetadataUpdated),
            _ => None,
        }
    }
}

/// One propagated write. `payload` holds the partial sub-entity fields of
/// the originating update as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveEvent {
    pub kind: SaveEventKind,
    pub game_save_id: Uuid,
    pub user_email: String,
    pub payload: serde_json::Value,
    /// Milliseconds since the Unix epoch at publication time.
    pub timestamp: i64,
    pub correlation_id: Uuid,
}

impl SaveEvent {
    /// Event for a write happening now.
    pub fn new(
        kind: SaveEventKind,
        game_save_id: Uuid,
        user_email: String,
        payload: serde_json::Value,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            kind,
            game_save_id,
            user_email,
            payload,
            timestamp: now.unix_timestamp() * 1_000 + i64::from(now.millisecond()),
            correlation_id: Uuid::new_v4(),
        }
    }
}

/// A stream entry handed to the consumer loop, pairing the transport-level
/// entry id (used for acknowledgement) with the decoded event.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub entry_id: String,
    pub event: SaveEvent,
}

/// Publish side of the propagation stream. Publication failures are logged
/// and absorbed: the originating instance still owns durability through the
/// pending flush log, remote instances converge on the next event or flush.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: SaveEvent) -> BoxFuture<'static, ()>;
}

/// Consume side of the propagation stream.
pub trait EventSource: Send + Sync {
    /// Wait for the next batch of entries. Undecodable entries are dropped
    /// (and acknowledged) inside the source so they cannot wedge the stream.
    fn poll(&self) -> BoxFuture<'_, Vec<StreamEntry>>;
    /// Acknowledge a batch of handled entries.
    fn ack(&self, entry_ids: Vec<String>) -> BoxFuture<'_, ()>;
}

/// Publisher that drops every event; used when running without a stream
/// backend (single instance) and in store-direct tests.
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: SaveEvent) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_timestamp_is_unix_milliseconds() {
        let before = OffsetDateTime::now_utc().unix_timestamp() * 1_000;
        let event = SaveEvent::new(
            SaveEventKind::CurrencyUpdated,
            Uuid::new_v4(),
            "a@x.com".into(),
            serde_json::json!({ "gold": 1 }),
        );
        let after = (OffsetDateTime::now_utc().unix_timestamp() + 1) * 1_000;
        assert!(event.timestamp >= before);
        assert!(event.timestamp <= after);
    }
}
