//! Save-ownership authorization backed by the metadata cache.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    cache::{CacheManager, CachePort},
    dao::save_store::SaveStore,
    domain::GameMetadata,
    error::ServiceError,
};

/// Answers "does this user own this save" on the hot path of every
/// save-scoped request.
pub struct OwnershipService {
    store: Arc<dyn SaveStore>,
    cache: Arc<dyn CachePort<GameMetadata>>,
    manager: Arc<CacheManager>,
}

impl OwnershipService {
    /// Wire the resolver over the store and the ownership cache.
    pub fn new(
        store: Arc<dyn SaveStore>,
        cache: Arc<dyn CachePort<GameMetadata>>,
        manager: Arc<CacheManager>,
    ) -> Self {
        Self {
            store,
            cache,
            manager,
        }
    }

    /// Metadata record for the save id, cache-first when enabled.
    pub async fn metadata(&self, id: Uuid) -> Result<GameMetadata, ServiceError> {
        if self.manager.is_enabled() {
            if let Some(cached) = self.cache.get(id).await {
                return Ok(cached);
            }
        }
        let metadata = self.read_store(id).await?;
        if self.manager.is_enabled() {
            self.cache.set(id, metadata.clone()).await;
        }
        Ok(metadata)
    }

    /// Reject the caller unless `user_email` owns the save.
    ///
    /// On a cache miss the entry is populated from the store and the
    /// comparison runs against the store-sourced value, never against the
    /// caller's claim; on a hit the cached owner decides without a store
    /// round-trip, which is the fast path this cache exists for.
    pub async fn check(&self, id: Uuid, user_email: &str) -> Result<(), ServiceError> {
        if !self.manager.is_enabled() {
            let metadata = self.read_store(id).await?;
            return Self::compare(&metadata, user_email);
        }

        match self.cache.get(id).await {
            Some(cached) => Self::compare(&cached, user_email),
            None => {
                let metadata = self.read_store(id).await?;
                self.cache.set(id, metadata.clone()).await;
                Self::compare(&metadata, user_email)
            }
        }
    }

    async fn read_store(&self, id: Uuid) -> Result<GameMetadata, ServiceError> {
        self.store
            .find_metadata(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game save `{id}` not found")))
    }

    fn compare(metadata: &GameMetadata, user_email: &str) -> Result<(), ServiceError> {
        if metadata.user_email != user_email {
            return Err(ServiceError::Forbidden(
                "the given user is not the owner of the game save".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::memory::MemoryCache,
        dao::save_store::memory::MemorySaveStore,
    };

    struct Fixture {
        service: OwnershipService,
        store: MemorySaveStore,
        cache: Arc<MemoryCache<GameMetadata>>,
    }

    fn fixture(cache_enabled: bool) -> Fixture {
        let store = MemorySaveStore::new();
        let cache = Arc::new(MemoryCache::<GameMetadata>::new(0));
        let manager = Arc::new(CacheManager::new(
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            cache.clone(),
            cache_enabled,
        ));
        let service = OwnershipService::new(Arc::new(store.clone()), cache.clone(), manager);
        Fixture {
            service,
            store,
            cache,
        }
    }

    async fn seed(store: &MemorySaveStore, owner: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .create_metadata(GameMetadata::new(id, owner.into(), None))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn miss_populates_cache_and_compares_store_value() {
        let fx = fixture(true);
        let id = seed(&fx.store, "a@x.com").await;

        fx.service.check(id, "a@x.com").await.unwrap();
        let cached = fx.cache.get(id).await.unwrap();
        assert_eq!(cached.user_email, "a@x.com");
    }

    #[tokio::test]
    async fn hit_rejects_other_caller_without_store_read() {
        let fx = fixture(true);
        let id = seed(&fx.store, "a@x.com").await;
        fx.service.check(id, "a@x.com").await.unwrap();

        // Drop the store row: a subsequent check must be answered purely
        // from cache.
        fx.store.delete_save(id).await.unwrap();

        fx.service.check(id, "a@x.com").await.unwrap();
        let err = fx.service.check(id, "b@x.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn disabled_cache_goes_straight_to_store() {
        let fx = fixture(false);
        let id = seed(&fx.store, "a@x.com").await;

        fx.service.check(id, "a@x.com").await.unwrap();
        assert!(fx.cache.get(id).await.is_none());

        let err = fx.service.check(id, "b@x.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn unknown_save_is_not_found() {
        let fx = fixture(true);
        let err = fx.service.check(Uuid::new_v4(), "a@x.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
