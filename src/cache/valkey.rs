//! Valkey-backed cache port.
//!
//! Values are serialized as JSON; every key is namespaced with the port's
//! prefix so per-type clears cannot touch other sub-entities. Connectivity
//! failures are logged at `warn` and absorbed.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;
use uuid::Uuid;

use crate::cache::CachePort;

/// Cache port backed by a shared Valkey instance.
pub struct ValkeyCache<T> {
    conn: ConnectionManager,
    prefix: &'static str,
    ttl_seconds: u64,
    enabled: AtomicBool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> ValkeyCache<T> {
    /// New port using `prefix` as the key namespace. A zero TTL stores
    /// entries without expiry.
    pub fn new(conn: ConnectionManager, prefix: &'static str, ttl_seconds: u64) -> Self {
        Self {
            conn,
            prefix,
            ttl_seconds,
            enabled: AtomicBool::new(true),
            _marker: std::marker::PhantomData,
        }
    }

    fn key(&self, id: Uuid) -> String {
        format!("{}{}", self.prefix, id)
    }
}

impl<T> CachePort<T> for ValkeyCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn get(&self, id: Uuid) -> BoxFuture<'static, Option<T>> {
        let enabled = self.is_enabled();
        let mut conn = self.conn.clone();
        let key = self.key(id);
        let prefix = self.prefix;
        Box::pin(async move {
            if !enabled {
                return None;
            }
            let raw: Option<String> = match conn.get(&key).await {
                Ok(value) => value,
                Err(err) => {
                    warn!(%key, error = %err, "failed to read from valkey cache");
                    return None;
                }
            };
            raw.and_then(|json| match serde_json::from_str(&json) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%key, cache = prefix, error = %err, "dropping undecodable cache entry");
                    None
                }
            })
        })
    }

    fn set(&self, id: Uuid, value: T) -> BoxFuture<'static, ()> {
        let enabled = self.is_enabled();
        let mut conn = self.conn.clone();
        let key = self.key(id);
        let ttl = self.ttl_seconds;
        Box::pin(async move {
            if !enabled {
                return;
            }
            let json = match serde_json::to_string(&value) {
                Ok(json) => json,
                Err(err) => {
                    warn!(%key, error = %err, "failed to serialize cache entry");
                    return;
                }
            };
            let result: redis::RedisResult<()> = if ttl > 0 {
                conn.set_ex(&key, json, ttl).await
            } else {
                conn.set(&key, json).await
            };
            if let Err(err) = result {
                warn!(%key, error = %err, "failed to write to valkey cache");
            }
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let mut conn = self.conn.clone();
        let key = self.key(id);
        Box::pin(async move {
            let result: redis::RedisResult<()> = conn.del(&key).await;
            if let Err(err) = result {
                warn!(%key, error = %err, "failed to delete valkey cache entry");
            }
        })
    }

    fn get_all(&self) -> BoxFuture<'static, Vec<(Uuid, T)>> {
        let mut conn = self.conn.clone();
        let prefix = self.prefix;
        Box::pin(async move {
            let keys: Vec<String> = match conn.keys(format!("{prefix}*")).await {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(cache = prefix, error = %err, "failed to list valkey cache keys");
                    return Vec::new();
                }
            };
            let mut entries = Vec::with_capacity(keys.len());
            for key in keys {
                let Ok(id) = key[prefix.len()..].parse::<Uuid>() else {
                    warn!(%key, "skipping cache key with malformed save id");
                    continue;
                };
                let raw: Option<String> = match conn.get(&key).await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(%key, error = %err, "failed to read valkey cache entry");
                        continue;
                    }
                };
                if let Some(value) = raw.and_then(|json| serde_json::from_str(&json).ok()) {
                    entries.push((id, value));
                }
            }
            entries
        })
    }

    fn clear(&self) -> BoxFuture<'static, ()> {
        let mut conn = self.conn.clone();
        let prefix = self.prefix;
        Box::pin(async move {
            let keys: Vec<String> = match conn.keys(format!("{prefix}*")).await {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(cache = prefix, error = %err, "failed to list valkey cache keys");
                    return;
                }
            };
            if keys.is_empty() {
                return;
            }
            let result: redis::RedisResult<()> = conn.del(&keys).await;
            if let Err(err) = result {
                warn!(cache = prefix, error = %err, "failed to clear valkey cache");
            }
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}
