//! In-memory cache port used by tests and single-instance deployments
//! running without a Valkey tier.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::cache::CachePort;

/// TTL key/value cache backed by a [`DashMap`]. Expiry is checked lazily on
/// read, mirroring how a TTL store surfaces expired keys as misses.
pub struct MemoryCache<T> {
    entries: Arc<DashMap<Uuid, (T, Option<Instant>)>>,
    ttl: Option<Duration>,
    enabled: AtomicBool,
}

impl<T> MemoryCache<T> {
    /// New cache; a zero TTL keeps entries until cleared.
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: (ttl_seconds > 0).then(|| Duration::from_secs(ttl_seconds)),
            enabled: AtomicBool::new(true),
        }
    }
}

impl<T> CachePort<T> for MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self, id: Uuid) -> BoxFuture<'static, Option<T>> {
        let enabled = self.is_enabled();
        let entries = self.entries.clone();
        Box::pin(async move {
            if !enabled {
                return None;
            }
            let expired = matches!(
                entries.get(&id),
                Some(entry) if entry.1.is_some_and(|deadline| deadline <= Instant::now())
            );
            if expired {
                entries.remove(&id);
                return None;
            }
            entries.get(&id).map(|entry| entry.0.clone())
        })
    }

    fn set(&self, id: Uuid, value: T) -> BoxFuture<'static, ()> {
        let enabled = self.is_enabled();
        let entries = self.entries.clone();
        let deadline = self.ttl.map(|ttl| Instant::now() + ttl);
        Box::pin(async move {
            if enabled {
                entries.insert(id, (value, deadline));
            }
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, ()> {
        let entries = self.entries.clone();
        Box::pin(async move {
            entries.remove(&id);
        })
    }

    fn get_all(&self) -> BoxFuture<'static, Vec<(Uuid, T)>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let now = Instant::now();
            entries
                .iter()
                .filter(|entry| entry.1.is_none_or(|deadline| deadline > now))
                .map(|entry| (*entry.key(), entry.0.clone()))
                .collect()
        })
    }

    fn clear(&self) -> BoxFuture<'static, ()> {
        let entries = self.entries.clone();
        Box::pin(async move {
            entries.clear();
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_reads_as_miss_and_drops_writes() {
        let cache = MemoryCache::<u32>::new(0);
        let id = Uuid::new_v4();
        cache.set(id, 1).await;
        assert_eq!(cache.get(id).await, Some(1));

        cache.set_enabled(false);
        assert_eq!(cache.get(id).await, None);
        cache.set(id, 2).await;

        cache.set_enabled(true);
        assert_eq!(cache.get(id).await, Some(1));
    }

    #[tokio::test]
    async fn get_all_lists_every_live_entry() {
        let cache = MemoryCache::<u32>::new(0);
        let kept = Uuid::new_v4();
        let removed = Uuid::new_v4();
        cache.set(kept, 1).await;
        cache.set(removed, 2).await;
        cache.delete(removed).await;

        let all = cache.get_all().await;
        assert_eq!(all, vec![(kept, 1)]);

        cache.clear().await;
        assert!(cache.get_all().await.is_empty());
    }
}
