//! Flush coordination: durably persisting cached writes into the store.

use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    cache::{CachePort, pending::PendingWriteLog},
    dao::save_store::SaveStore,
    domain::{Characteristics, Currency, Stage},
    error::ServiceError,
    services::save_data::SaveAggregate,
};

/// Persists cached-but-not-yet-stored values into the relational store, on
/// demand (pre-delete, admin) and on a schedule.
pub struct FlushService {
    store: Arc<dyn SaveStore>,
    characteristics: Arc<dyn CachePort<Characteristics>>,
    currency: Arc<dyn CachePort<Currency>>,
    stage: Arc<dyn CachePort<Stage>>,
    pending: Arc<dyn PendingWriteLog>,
}

impl FlushService {
    /// Wire the coordinator over the store, the cached aggregates, and the
    /// pending log.
    pub fn new(
        store: Arc<dyn SaveStore>,
        characteristics: Arc<dyn CachePort<Characteristics>>,
        currency: Arc<dyn CachePort<Currency>>,
        stage: Arc<dyn CachePort<Stage>>,
        pending: Arc<dyn PendingWriteLog>,
    ) -> Self {
        Self {
            store,
            characteristics,
            currency,
            stage,
            pending,
        }
    }

    /// Flush every cached sub-entity of one save into the store.
    ///
    /// With `clear` the cache entries are removed afterwards (pre-delete
    /// path); without it they stay in place as a valid accelerator
    /// (scheduled path). Flushing is idempotent: writing a value the store
    /// already holds is a no-op update.
    pub async fn flush_save(&self, id: Uuid, clear: bool) -> Result<(), ServiceError> {
        debug!(save_id = %id, clear, "flushing game save");
        self.flush_one(&self.characteristics, id, clear).await?;
        self.flush_one(&self.currency, id, clear).await?;
        self.flush_one(&self.stage, id, clear).await?;
        self.pending.remove(id).await;
        Ok(())
    }

    /// Flush every save id recorded in the pending log. A transient failure
    /// for one save is logged and leaves that id pending; the rest still
    /// flush. A missing store row can never flush (the save was deleted
    /// under a still-connected writer), so its cached writes are discarded
    /// instead of retried forever.
    pub async fn flush_all(&self) -> usize {
        let ids = self.pending.all().await;
        let mut flushed = 0;
        for id in ids {
            match self.flush_save(id, false).await {
                Ok(()) => flushed += 1,
                Err(ServiceError::NotFound(_)) => {
                    warn!(save_id = %id, "store row is gone; discarding orphaned cached writes");
                    self.discard(id).await;
                }
                Err(err) => {
                    error!(save_id = %id, error = %err, "failed to flush game save; keeping it pending");
                }
            }
        }
        flushed
    }

    async fn discard(&self, id: Uuid) {
        self.characteristics.delete(id).await;
        self.currency.delete(id).await;
        self.stage.delete(id).await;
        self.pending.remove(id).await;
    }

    async fn flush_one<T: SaveAggregate>(
        &self,
        cache: &Arc<dyn CachePort<T>>,
        id: Uuid,
        clear: bool,
    ) -> Result<(), ServiceError> {
        let Some(cached) = cache.get(id).await else {
            return Ok(());
        };
        // Writing the present fields is equivalent to storing the merged
        // complete record, since the store row is complete and the update
        // lands as one atomic row replacement.
        T::update(self.store.as_ref(), id, cached).await?;
        if clear {
            cache.delete(id).await;
        }
        debug!(save_id = %id, entity = T::ENTITY, "flushed cached value");
        Ok(())
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
    };

    struct Fixture {
        flush: FlushService,
        store: MemorySaveStore,
        characteristics: Arc<MemoryCache<Characteristics>>,
        currency: Arc<MemoryCache<Currency>>,
        pending: MemoryPendingLog,
    }

    fn fixture() -> Fixture {
        let store = MemorySaveStore::new();
        let characteristics = Arc::new(MemoryCache::<Characteristics>::new(0));
        let currency = Arc::new(MemoryCache::<Currency>::new(0));
        let stage = Arc::new(MemoryCache::<Stage>::new(0));
        let pending = MemoryPendingLog::new();
        let flush = FlushService::new(
            Arc::new(store.clone()),
            characteristics.clone(),
            currency.clone(),
            stage,
            Arc::new(pending.clone()),
        );
        Fixture {
            flush,
            store,
            characteristics,
            currency,
            pending,
        }
    }

    #[tokio::test]
    async fn flush_persists_cached_fields_and_unmarks_pending() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store
            .create_characteristics(id, Characteristics::complete(10, 0, 0, 100, 5))
            .await
            .unwrap();
        fx.characteristics
            .set(
                id,
                Characteristics {
                    attack: Some(20),
                    ..Default::default()
                },
            )
            .await;
        fx.pending.mark(id).await;

        fx.flush.flush_save(id, false).await.unwrap();

        assert_eq!(
            fx.store.find_characteristics(id).await.unwrap().unwrap(),
            Characteristics::complete(20, 0, 0, 100, 5)
        );
        // Scheduled flush leaves the entry in place as an accelerator.
        assert!(fx.characteristics.get(id).await.is_some());
        assert!(fx.pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn flush_is_idempotent() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store
            .create_currency(id, Currency::complete(1, 2, 3, 4))
            .await
            .unwrap();
        fx.currency
            .set(
                id,
                Currency {
                    gold: Some(9),
                    ..Default::default()
                },
            )
            .await;

        fx.flush.flush_save(id, false).await.unwrap();
        let first = fx.store.find_currency(id).await.unwrap().unwrap();
        fx.flush.flush_save(id, false).await.unwrap();
        let second = fx.store.find_currency(id).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Currency::complete(9, 2, 3, 4));
    }

    #[tokio::test]
    async fn clearing_flush_removes_cache_entries() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store
            .create_characteristics(id, Characteristics::default_complete())
            .await
            .unwrap();
        fx.characteristics
            .set(id, Characteristics::default_complete())
            .await;

        fx.flush.flush_save(id, true).await.unwrap();
        assert!(fx.characteristics.get(id).await.is_none());
    }

    #[tokio::test]
    async fn flush_all_drains_the_pending_log_and_discards_orphans() {
        let fx = fixture();
        let good = Uuid::new_v4();
        let orphan = Uuid::new_v4();
        fx.store
            .create_characteristics(good, Characteristics::complete(1, 0, 0, 1, 0))
            .await
            .unwrap();
        fx.characteristics
            .set(
                good,
                Characteristics {
                    attack: Some(5),
                    ..Default::default()
                },
            )
            .await;
        // No store row for `orphan`: the save was deleted, so its cached
        // writes can never land.
        fx.characteristics
            .set(
                orphan,
                Characteristics {
                    attack: Some(7),
                    ..Default::default()
                },
            )
            .await;
        fx.pending.mark(good).await;
        fx.pending.mark(orphan).await;

        let flushed = fx.flush.flush_all().await;
        assert_eq!(flushed, 1);
        assert_eq!(
            fx.store
                .find_characteristics(good)
                .await
                .unwrap()
                .unwrap()
                .attack,
            Some(5)
        );
        assert!(fx.characteristics.get(orphan).await.is_none());
        assert!(fx.pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn missing_store_row_does_not_stay_pending_across_rounds() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.characteristics
            .set(
                id,
                Characteristics {
                    attack: Some(7),
                    ..Default::default()
                },
            )
            .await;
        fx.pending.mark(id).await;

        assert_eq!(fx.flush.flush_all().await, 0);
        assert!(fx.pending.all().await.is_empty());
        assert!(fx.characteristics.get(id).await.is_none());

        // The next scheduled round has nothing left to retry.
        assert_eq!(fx.flush.flush_all().await, 0);
    }

    #[tokio::test]
    async fn flushing_a_save_with_no_cache_entries_is_a_noop() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.pending.mark(id).await;
        fx.flush.flush_save(id, false).await.unwrap();
        assert!(fx.pending.all().await.is_empty());
    }
}
