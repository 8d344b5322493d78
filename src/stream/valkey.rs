//! Valkey stream transport for propagation events.
//!
//! Events are appended with `XADD` as flat field maps and consumed through a
//! consumer group, one consumer per server instance. Within the single
//! stream, entries for one save id stay ordered; acknowledgement happens
//! after dispatch so delivery is at-least-once.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use redis::{
    AsyncCommands,
    aio::ConnectionManager,
    streams::{StreamReadOptions, StreamReadReply},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::stream::{EventPublisher, EventSource, SaveEvent, SaveEventKind, StreamEntry};

const FIELD_EVENT_TYPE: &str = "event_type";
const FIELD_GAME_SAVE_ID: &str = "game_save_id";
const FIELD_USER_EMAIL: &str = "user_email";
const FIELD_PAYLOAD: &str = "payload";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_CORRELATION_ID: &str = "correlation_id";

const POLL_BLOCK_MS: usize = 5_000;
const POLL_COUNT: usize = 16;

/// Publisher appending events to a Valkey stream.
pub struct ValkeyEventPublisher {
    conn: ConnectionManager,
    stream_key: String,
}

impl ValkeyEventPublisher {
    /// Publisher bound to `stream_key`.
    pub fn new(conn: ConnectionManager, stream_key: String) -> Self {
        Self { conn, stream_key }
    }
}

impl EventPublisher for ValkeyEventPublisher {
    fn publish(&self, event: SaveEvent) -> BoxFuture<'static, ()> {
        let mut conn = self.conn.clone();
        let stream_key = self.stream_key.clone();
        Box::pin(async move {
            let payload = match serde_json::to_string(&event.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(error = %err, "failed to serialize event payload");
                    return;
                }
            };
            let fields: [(&str, String); 6] = [
                (FIELD_EVENT_TYPE, event.kind.as_str().to_string()),
                (FIELD_GAME_SAVE_ID, event.game_save_id.to_string()),
                (FIELD_USER_EMAIL, event.user_email),
                (FIELD_PAYLOAD, payload),
                (FIELD_TIMESTAMP, event.timestamp.to_string()),
                (FIELD_CORRELATION_ID, event.correlation_id.to_string()),
            ];
            let result: redis::RedisResult<String> =
                conn.xadd(&stream_key, "*", &fields).await;
            if let Err(err) = result {
                warn!(
                    stream = %stream_key,
                    save_id = %event.game_save_id,
                    error = %err,
                    "failed to publish propagation event"
                );
            }
        })
    }
}

/// Consumer-group reader for one server instance.
pub struct ValkeyEventSource {
    conn: ConnectionManager,
    stream_key: String,
    group: String,
    consumer: String,
    /// True until this consumer's pending entries, left unacknowledged by a
    /// previous run, have been drained. Backlog polls read from `0`; once
    /// the backlog is empty the cursor moves to new entries.
    backlog: AtomicBool,
}

impl ValkeyEventSource {
    /// Create the source and its consumer group (idempotent: an already
    /// existing group is fine).
    pub async fn new(
        conn: ConnectionManager,
        stream_key: String,
        group: String,
        consumer: String,
    ) -> redis::RedisResult<Self> {
        let mut setup = conn.clone();
        let created: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&stream_key)
            .arg(&group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut setup)
            .await;
        if let Err(err) = created {
            if !err.to_string().contains("BUSYGROUP") {
                return Err(err);
            }
        }
        Ok(Self {
            conn,
            stream_key,
            group,
            consumer,
            backlog: AtomicBool::new(true),
        })
    }
}

impl EventSource for ValkeyEventSource {
    fn poll(&self) -> BoxFuture<'_, Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let stream_key = self.stream_key.clone();
        let group = self.group.clone();
        let consumer = self.consumer.clone();
        let backlog = &self.backlog;
        Box::pin(async move {
            let draining = backlog.load(Ordering::Acquire);
            // A `0` cursor re-reads entries delivered to this consumer but
            // never acked (a crash before XACK); `>` reads new entries.
            let cursor = if draining { "0" } else { ">" };
            let options = StreamReadOptions::default()
                .group(&group, &consumer)
                .block(POLL_BLOCK_MS)
                .count(POLL_COUNT);
            let reply: StreamReadReply =
                match conn.xread_options(&[&stream_key], &[cursor], &options).await {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!(stream = %stream_key, error = %err, "failed to read event stream");
                        return Vec::new();
                    }
                };

            let mut delivered = 0usize;
            let mut entries = Vec::new();
            for key in reply.keys {
                for id in key.ids {
                    delivered += 1;
                    match decode_event(&id.map) {
                        Some(event) => entries.push(StreamEntry {
                            entry_id: id.id,
                            event,
                        }),
                        None => {
                            // Poisoned entry: ack it away so it cannot stall
                            // the group; retry/dead-letter policy is the
                            // operator's concern.
                            error!(stream = %stream_key, entry = %id.id, "dropping undecodable stream entry");
                            let _: redis::RedisResult<()> =
                                conn.xack(&stream_key, &group, &[&id.id]).await;
                        }
                    }
                }
            }
            if draining && delivered == 0 {
                backlog.store(false, Ordering::Release);
            }
            entries
        })
    }

    fn ack(&self, entry_ids: Vec<String>) -> BoxFuture<'_, ()> {
        let mut conn = self.conn.clone();
        let stream_key = self.stream_key.clone();
        let group = self.group.clone();
        Box::pin(async move {
            if entry_ids.is_empty() {
                return;
            }
            let result: redis::RedisResult<()> =
                conn.xack(&stream_key, &group, &entry_ids).await;
            if let Err(err) = result {
                warn!(stream = %stream_key, error = %err, "failed to ack stream entries");
            }
        })
    }
}

fn field(map: &HashMap<String, redis::Value>, name: &str) -> Option<String> {
    map.get(name)
        .and_then(|value| redis::from_redis_value::<String>(value).ok())
}

fn decode_event(map: &HashMap<String, redis::Value>) -> Option<SaveEvent> {
    let kind = SaveEventKind::parse(&field(map, FIELD_EVENT_TYPE)?)?;
    let game_save_id = field(map, FIELD_GAME_SAVE_ID)?.parse::<Uuid>().ok()?;
    let user_email = field(map, FIELD_USER_EMAIL)?;
    let payload = serde_json::from_str(&field(map, FIELD_PAYLOAD)?).ok()?;
    let timestamp = field(map, FIELD_TIMESTAMP)?.parse::<i64>().ok()?;
    let correlation_id = field(map, FIELD_CORRELATION_ID)?.parse::<Uuid>().ok()?;
    Some(SaveEvent {
        kind,
        game_save_id,
        user_email,
        payload,
        timestamp,
        correlation_id,
    })
}
