//! Durable log of save ids with cached-but-not-yet-stored writes.
//!
//! Every cache-mode write marks its save id here; the flush coordinator
//! unmarks ids once their cached values are persisted. Startup recovery
//! replays whatever a crashed instance left behind, which keeps recovery
//! proportional to the number of pending saves instead of the whole cache.

use std::sync::Arc;

use dashmap::DashSet;
use futures::future::BoxFuture;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::warn;
use uuid::Uuid;

/// Valkey set key holding pending save ids.
const PENDING_KEY: &str = "flush:pending";

/// Log of save ids awaiting a durable flush.
///
/// Marking is best-effort in the same sense as the cache ports: a backend
/// failure is logged, not propagated, because the write it tracks lives in
/// the same backend and failed alongside it.
pub trait PendingWriteLog: Send + Sync {
    /// Record that the save id has an unflushed cache write.
    fn mark(&self, id: Uuid) -> BoxFuture<'static, ()>;
    /// Drop the save id from the log after a successful flush.
    fn remove(&self, id: Uuid) -> BoxFuture<'static, ()>;
    /// Every pending save id. Malformed entries are skipped, never fatal.
    fn all(&self) -> BoxFuture<'static, Vec<Uuid>>;
}

/// Pending log stored as a Valkey set, surviving application restarts.
pub struct ValkeyPendingLog {
    conn: ConnectionManager,
}

impl ValkeyPendingLog {
    /// New log bound to the shared Valkey connection.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl PendingWriteLog for ValkeyPendingLog {
    fn mark(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let result: redis::RedisResult<()> = conn.sadd(PENDING_KEY, id.to_string()).await;
            if let Err(err) = result {
                warn!(save_id = %id, error = %err, "failed to mark save as pending flush");
            }
        })
    }

    fn remove(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let result: redis::RedisResult<()> = conn.srem(PENDING_KEY, id.to_string()).await;
            if let Err(err) = result {
                warn!(save_id = %id, error = %err, "failed to unmark pending flush");
            }
        })
    }

    fn all(&self) -> BoxFuture<'static, Vec<Uuid>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let members: Vec<String> = match conn.smembers(PENDING_KEY).await {
                Ok(members) => members,
                Err(err) => {
                    warn!(error = %err, "failed to read pending flush log");
                    return Vec::new();
                }
            };
            members
                .into_iter()
                .filter_map(|member| match member.parse::<Uuid>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(entry = %member, "skipping malformed pending flush entry");
                        None
                    }
                })
                .collect()
        })
    }
}

/// In-memory pending log for tests and cache-less deployments.
#[derive(Clone, Default)]
pub struct MemoryPendingLog {
    ids: Arc<DashSet<Uuid>>,
}

impl MemoryPendingLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingWriteLog for MemoryPendingLog {
    fn mark(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let ids = self.ids.clone();
        Box::pin(async move {
            ids.insert(id);
        })
    }

    fn remove(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let ids = self.ids.clone();
        Box::pin(async move {
            ids.remove(&id);
        })
    }

    fn all(&self) -> BoxFuture<'static, Vec<Uuid>> {
        let ids = self.ids.clone();
        Box::pin(async move { ids.iter().map(|id| *id).collect() })
    }
}
