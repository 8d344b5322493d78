//! Per-aggregate command/query service routing reads and writes through the
//! cache tier, the merge policy, and the durable store.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    cache::{CacheManager, CachePort, pending::PendingWriteLog},
    dao::{save_store::SaveStore, storage::StorageResult},
    domain::{Characteristics, Currency, Mergeable, Stage},
    error::ServiceError,
    stream::{EventPublisher, SaveEvent, SaveEventKind},
};

/// A cacheable sub-entity of a game save, tying the domain type to its store
/// operations, its propagation event kind, and its initialization defaults.
///
/// The service logic below is written once against this trait; each concrete
/// sub-entity contributes only its field list (via [`Mergeable`]) and its
/// store plumbing.
pub trait SaveAggregate:
    Mergeable + Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Propagation event kind for writes to this sub-entity.
    const KIND: SaveEventKind;
    /// Human-readable entity name for errors and logs.
    const ENTITY: &'static str;

    /// Complete record made of the hard-coded initialization defaults.
    fn default_complete() -> Self;
    /// Fill absent fields with initialization defaults, never with null.
    fn with_defaults(self) -> Self;

    /// Complete record from the store, if the row exists.
    fn find(store: &dyn SaveStore, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Self>>>;
    /// Create the store row. The value must be complete.
    fn create(store: &dyn SaveStore, id: Uuid, value: Self)
    -> BoxFuture<'static, StorageResult<Self>>;
    /// Partial update touching only the present fields of `update`.
    fn update(store: &dyn SaveStore, id: Uuid, update: Self)
    -> BoxFuture<'static, StorageResult<()>>;
}

impl SaveAggregate for Characteristics {
    const KIND: SaveEventKind = SaveEventKind::CharacteristicsUpdated;
    const ENTITY: &'static str = "characteristics";

    fn default_complete() -> Self {
        Characteristics::default_complete()
    }

    fn with_defaults(self) -> Self {
        Characteristics::with_defaults(self)
    }

    fn find(store: &dyn SaveStore, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Self>>> {
        store.find_characteristics(id)
    }

    fn create(
        store: &dyn SaveStore,
        id: Uuid,
        value: Self,
    ) -> BoxFuture<'static, StorageResult<Self>> {
        store.create_characteristics(id, value)
    }

    fn update(
        store: &dyn SaveStore,
        id: Uuid,
        update: Self,
    ) -> BoxFuture<'static, StorageResult<()>> {
        store.update_characteristics(id, update)
    }
}

impl SaveAggregate for Currency {
    const KIND: SaveEventKind = SaveEventKind::CurrencyUpdated;
    const ENTITY: &'static str = "currency";

    fn default_complete() -> Self {
        Currency::default_complete()
    }

    fn with_defaults(self) -> Self {
        Currency::with_defaults(self)
    }

    fn find(store: &dyn SaveStore, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Self>>> {
        store.find_currency(id)
    }

    fn create(
        store: &dyn SaveStore,
        id: Uuid,
        value: Self,
    ) -> BoxFuture<'static, StorageResult<Self>> {
        store.create_currency(id, value)
    }

    fn update(
        store: &dyn SaveStore,
        id: Uuid,
        update: Self,
    ) -> BoxFuture<'static, StorageResult<()>> {
        store.update_currency(id, update)
    }
}

impl SaveAggregate for Stage {
    const KIND: SaveEventKind = SaveEventKind::StageUpdated;
    const ENTITY: &'static str = "stage";

    fn default_complete() -> Self {
        Stage::default_complete()
    }

    fn with_defaults(self) -> Self {
        Stage::with_defaults(self)
    }

    fn find(store: &dyn SaveStore, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Self>>> {
        store.find_stage(id)
    }

    fn create(
        store: &dyn SaveStore,
        id: Uuid,
        value: Self,
    ) -> BoxFuture<'static, StorageResult<Self>> {
        store.create_stage(id, value)
    }

    fn update(
        store: &dyn SaveStore,
        id: Uuid,
        update: Self,
    ) -> BoxFuture<'static, StorageResult<()>> {
        store.update_stage(id, update)
    }
}

/// Query/command entry point for one sub-entity type, shared by REST
/// controllers, the WebSocket ingress, and the stream consumer.
pub struct SaveDataService<T: SaveAggregate> {
    store: Arc<dyn SaveStore>,
    cache: Arc<dyn CachePort<T>>,
    manager: Arc<CacheManager>,
    publisher: Arc<dyn EventPublisher>,
    pending: Arc<dyn PendingWriteLog>,
}

impl<T: SaveAggregate> SaveDataService<T> {
    /// Wire the service over its collaborators.
    pub fn new(
        store: Arc<dyn SaveStore>,
        cache: Arc<dyn CachePort<T>>,
        manager: Arc<CacheManager>,
        publisher: Arc<dyn EventPublisher>,
        pending: Arc<dyn PendingWriteLog>,
    ) -> Self {
        Self {
            store,
            cache,
            manager,
            publisher,
            pending,
        }
    }

    /// Resolve the current record for the save id.
    ///
    /// Cache-first when the tier is enabled; a partial cache entry is healed
    /// by merging against the store row and written back, so the next read
    /// is served from cache alone. Every returned record is complete.
    pub async fn get(&self, id: Uuid) -> Result<T, ServiceError> {
        if !self.manager.is_enabled() {
            return self.read_store(id).await;
        }
        match self.cache.get(id).await {
            Some(cached) if cached.is_complete() => Ok(cached),
            Some(partial) => {
                let stored = self.read_store(id).await?;
                // The cached fields are fresher than the store row.
                let healed = T::merge(&stored, &partial);
                self.cache.set(id, healed.clone()).await;
                Ok(healed)
            }
            None => {
                let stored = self.read_store(id).await?;
                self.cache.set(id, stored.clone()).await;
                Ok(stored)
            }
        }
    }

    /// Apply a partial update.
    ///
    /// `to_cache` is the caller's snapshot of the toggle taken when the
    /// command was built, so a toggle flip cannot split one request across
    /// both paths. Cache-mode writes merge into the cached value, mark the
    /// pending flush log, and publish the *update* payload for other
    /// instances; store-direct writes touch only the provided columns.
    pub async fn save(
        &self,
        id: Uuid,
        update: T,
        to_cache: bool,
        user_email: &str,
    ) -> Result<(), ServiceError> {
        if update.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "{} update must set at least one field",
                T::ENTITY
            )));
        }

        if !to_cache {
            return T::update(self.store.as_ref(), id, update)
                .await
                .map_err(Into::into);
        }

        let merged = match self.cache.get(id).await {
            Some(existing) => T::merge(&existing, &update),
            None => update.clone(),
        };
        self.cache.set(id, merged).await;
        self.pending.mark(id).await;

        match serde_json::to_value(&update) {
            Ok(payload) => {
                self.publisher
                    .publish(SaveEvent::new(
                        T::KIND,
                        id,
                        user_email.to_owned(),
                        payload,
                    ))
                    .await;
            }
            Err(err) => {
                error!(save_id = %id, error = %err, "failed to encode propagation payload");
            }
        }
        Ok(())
    }

    /// Apply an update received from another instance's propagation event.
    ///
    /// Same cache-mode merge as [`SaveDataService::save`] but without
    /// re-publication (avoiding propagation loops) and without marking the
    /// pending log: the originating instance owns durability for its write.
    /// Duplicate delivery is harmless because merge is idempotent.
    pub async fn apply_event(&self, id: Uuid, update: T) -> Result<(), ServiceError> {
        if update.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "{} event carried no fields",
                T::ENTITY
            )));
        }
        if !self.manager.is_enabled() {
            warn!(
                save_id = %id,
                entity = T::ENTITY,
                "cache tier disabled locally; skipping propagated update"
            );
            return Ok(());
        }
        let merged = match self.cache.get(id).await {
            Some(existing) => T::merge(&existing, &update),
            None => update,
        };
        self.cache.set(id, merged).await;
        Ok(())
    }

    /// Create the store row at save-creation time with hard-coded defaults.
    pub async fn initialize_default(&self, id: Uuid) -> Result<T, ServiceError> {
        T::create(self.store.as_ref(), id, T::default_complete())
            .await
            .map_err(Into::into)
    }

    /// Create the store row with caller-supplied values, defaulting omitted
    /// fields. Initialization always produces a complete record.
    pub async fn initialize(&self, id: Uuid, values: T) -> Result<T, ServiceError> {
        T::create(self.store.as_ref(), id, values.with_defaults())
            .await
            .map_err(Into::into)
    }

    async fn read_store(&self, id: Uuid) -> Result<T, ServiceError> {
        T::find(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| ServiceError::record_not_found(T::ENTITY, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{
            memory::MemoryCache,
            pending::{MemoryPendingLog, PendingWriteLog},
        },
        dao::save_store::memory::MemorySaveStore,
        stream::{NoopPublisher, memory::MemoryStream},
    };

    struct Fixture {
        service: SaveDataService<Characteristics>,
        store: MemorySaveStore,
        cache: Arc<MemoryCache<Characteristics>>,
        manager: Arc<CacheManager>,
        pending: MemoryPendingLog,
        stream: Arc<MemoryStream>,
    }

    fn fixture(cache_enabled: bool) -> Fixture {
        let store = MemorySaveStore::new();
        let cache = Arc::new(MemoryCache::<Characteristics>::new(0));
        let manager = Arc::new(CacheManager::new(
            cache.clone(),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            cache_enabled,
        ));
        let pending = MemoryPendingLog::new();
        let stream = Arc::new(MemoryStream::new(16));
        let service = SaveDataService::new(
            Arc::new(store.clone()),
            cache.clone(),
            manager.clone(),
            stream.clone(),
            Arc::new(pending.clone()),
        );
        Fixture {
            service,
            store,
            cache,
            manager,
            pending,
            stream,
        }
    }

    fn attack_only(attack: i64) -> Characteristics {
        Characteristics {
            attack: Some(attack),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn store_direct_save_updates_only_present_fields() {
        let fx = fixture(false);
        let id = Uuid::new_v4();
        fx.store
            .create_characteristics(id, Characteristics::complete(10, 0, 0, 100, 5))
            .await
            .unwrap();

        fx.service
            .save(id, attack_only(20), false, "a@x.com")
            .await
            .unwrap();

        let row = fx.service.get(id).await.unwrap();
        assert_eq!(row, Characteristics::complete(20, 0, 0, 100, 5));
        assert!(fx.cache.get(id).await.is_none());
    }

    #[tokio::test]
    async fn cache_mode_save_leaves_store_untouched_and_read_heals() {
        let fx = fixture(true);
        let id = Uuid::new_v4();
        fx.store
            .create_characteristics(id, Characteristics::complete(10, 0, 0, 100, 5))
            .await
            .unwrap();

        fx.service
            .save(id, attack_only(20), true, "a@x.com")
            .await
            .unwrap();

        // Store unchanged, cache holds the partial update.
        assert_eq!(
            fx.store.find_characteristics(id).await.unwrap().unwrap(),
            Characteristics::complete(10, 0, 0, 100, 5)
        );
        assert_eq!(fx.cache.get(id).await, Some(attack_only(20)));
        assert_eq!(fx.pending.all().await, vec![id]);

        // Read heals the partial entry and upgrades the cache.
        let healed = fx.service.get(id).await.unwrap();
        assert_eq!(healed, Characteristics::complete(20, 0, 0, 100, 5));
        assert_eq!(fx.cache.get(id).await, Some(healed.clone()));

        // A second read is served from cache alone.
        let again = fx.service.get(id).await.unwrap();
        assert_eq!(again, healed);
    }

    #[tokio::test]
    async fn cache_miss_read_falls_through_and_populates_cache() {
        let fx = fixture(true);
        let id = Uuid::new_v4();
        let row = Characteristics::complete(1, 2, 3, 4, 5);
        fx.store
            .create_characteristics(id, row.clone())
            .await
            .unwrap();

        assert_eq!(fx.service.get(id).await.unwrap(), row);
        assert_eq!(fx.cache.get(id).await, Some(row));
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_touching_anything() {
        let fx = fixture(true);
        let id = Uuid::new_v4();
        let err = fx
            .service
            .save(id, Characteristics::default(), true, "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(fx.cache.get(id).await.is_none());
        assert!(fx.pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_save_yields_not_found() {
        let fx = fixture(true);
        let err = fx.service.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn cache_mode_save_publishes_the_update_payload() {
        let fx = fixture(true);
        let source = fx.stream.source();
        let id = Uuid::new_v4();

        fx.service
            .save(id, attack_only(20), true, "a@x.com")
            .await
            .unwrap();

        use crate::stream::EventSource;
        let entries = source.poll().await;
        assert_eq!(entries.len(), 1);
        let event = &entries[0].event;
        assert_eq!(event.kind, SaveEventKind::CharacteristicsUpdated);
        assert_eq!(event.game_save_id, id);
        assert_eq!(event.user_email, "a@x.com");
        // The wire payload is the partial update, not the merged record.
        let payload: Characteristics = serde_json::from_value(event.payload.clone()).unwrap();
        assert_eq!(payload, attack_only(20));
    }

    #[tokio::test]
    async fn apply_event_is_idempotent() {
        let fx = fixture(true);
        let id = Uuid::new_v4();

        fx.service.apply_event(id, attack_only(20)).await.unwrap();
        let first = fx.cache.get(id).await;
        fx.service.apply_event(id, attack_only(20)).await.unwrap();
        assert_eq!(fx.cache.get(id).await, first);
        assert_eq!(first, Some(attack_only(20)));

        // The consumer path does not take over durability for remote writes.
        assert!(fx.pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn initialize_produces_complete_records() {
        let fx = fixture(false);
        let id = Uuid::new_v4();
        let created = fx.service.initialize(id, attack_only(42)).await.unwrap();
        assert!(created.is_complete());
        assert_eq!(created.attack, Some(42));
        assert_eq!(created.health, Some(1));

        let other = Uuid::new_v4();
        let defaults = fx.service.initialize_default(other).await.unwrap();
        assert_eq!(defaults, Characteristics::default_complete());
    }

    #[tokio::test]
    async fn toggle_snapshot_routes_reads_to_store() {
        let fx = fixture(true);
        let id = Uuid::new_v4();
        fx.store
            .create_characteristics(id, Characteristics::complete(1, 0, 0, 1, 0))
            .await
            .unwrap();
        fx.service.save(id, attack_only(9), true, "a@x.com").await.unwrap();

        // After disabling the tier, reads bypass the cached partial entirely.
        fx.manager.toggle();
        assert_eq!(
            fx.service.get(id).await.unwrap(),
            Characteristics::complete(1, 0, 0, 1, 0)
        );
    }

    #[tokio::test]
    async fn noop_publisher_still_allows_cache_saves() {
        let store = MemorySaveStore::new();
        let cache = Arc::new(MemoryCache::<Characteristics>::new(0));
        let manager = Arc::new(CacheManager::new(
            cache.clone(),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            true,
        ));
        let service = SaveDataService::new(
            Arc::new(store),
            cache.clone(),
            manager,
            Arc::new(NoopPublisher),
            Arc::new(MemoryPendingLog::new()),
        );
        let id = Uuid::new_v4();
        service.save(id, attack_only(3), true, "a@x.com").await.unwrap();
        assert_eq!(cache.get(id).await, Some(attack_only(3)));
    }
}
