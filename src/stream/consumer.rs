//! Consumption side of cross-instance propagation.
//!
//! Each instance runs one consumer loop that polls the shared event stream,
//! applies every entry to the local cache, and acknowledges it. Delivery is
//! at-least-once; the merge-based apply path makes duplicates harmless.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::{
    cache::CachePort,
    domain::{Characteristics, Currency, GameMetadata, Stage},
    error::ServiceError,
    services::save_data::SaveDataService,
    stream::{EventSource, SaveEvent, SaveEventKind},
};

/// Routes decoded stream events to the matching local service.
pub struct EventDispatcher {
    characteristics: Arc<SaveDataService<Characteristics>>,
    currency: Arc<SaveDataService<Currency>>,
    stage: Arc<SaveDataService<Stage>>,
    metadata_cache: Arc<dyn CachePort<GameMetadata>>,
}

impl EventDispatcher {
    /// Wire the dispatcher over the per-aggregate services.
    pub fn new(
        characteristics: Arc<SaveDataService<Characteristics>>,
        currency: Arc<SaveDataService<Currency>>,
        stage: Arc<SaveDataService<Stage>>,
        metadata_cache: Arc<dyn CachePort<GameMetadata>>,
    ) -> Self {
        Self {
            characteristics,
            currency,
            stage,
            metadata_cache,
        }
    }

    /// Apply one event to the local cache tier.
    pub async fn dispatch(&self, event: &SaveEvent) -> Result<(), ServiceError> {
        let id = event.game_save_id;
        match event.kind {
            SaveEventKind::CharacteristicsUpdated => {
                let update = decode_payload::<Characteristics>(event)?;
                self.characteristics.apply_event(id, update).await
            }
            SaveEventKind::CurrencyUpdated => {
                let update = decode_payload::<Currency>(event)?;
                self.currency.apply_event(id, update).await
            }
            SaveEventKind::StageUpdated => {
                let update = decode_payload::<Stage>(event)?;
                self.stage.apply_event(id, update).await
            }
            SaveEventKind::MetadataUpdated => self.apply_metadata(id, event).await,
        }
    }

    /// Refresh the cached ownership record. A miss is left alone; the next
    /// ownership check repopulates from the store, which already holds the
    /// new nickname.
    async fn apply_metadata(&self, id: Uuid, event: &SaveEvent) -> Result<(), ServiceError> {
        let nickname = event
            .payload
            .get("nickname")
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                ServiceError::InvalidInput("metadata event carried no nickname".into())
            })?;
        if let Some(mut cached) = self.metadata_cache.get(id).await {
            cached.nickname = Some(nickname.to_owned());
            self.metadata_cache.set(id, cached).await;
        }
        Ok(())
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(event: &SaveEvent) -> Result<T, ServiceError> {
    serde_json::from_value(event.payload.clone()).map_err(|err| {
        ServiceError::InvalidInput(format!(
            "undecodable `{}` payload: {err}",
            event.kind.as_str()
        ))
    })
}

/// Poll the event source until the task is aborted.
///
/// Entries that fail to apply are logged and acknowledged anyway; replaying a
/// poisoned entry forever would wedge the consumer group.
pub async fn run(source: Arc<dyn EventSource>, dispatcher: Arc<EventDispatcher>) {
    info!("save event consumer started");
    loop {
        let entries = source.poll().await;
        if entries.is_empty() {
            continue;
        }
        let mut entry_ids = Vec::with_capacity(entries.len());
        for entry in &entries {
            if let Err(err) = dispatcher.dispatch(&entry.event).await {
                error!(
                    entry_id = %entry.entry_id,
                    save_id = %entry.event.game_save_id,
                    error = %err,
                    "failed to apply propagated event; dropping entry"
                );
            }
            entry_ids.push(entry.entry_id.clone());
        }
        source.ack(entry_ids).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{CacheManager, memory::MemoryCache, pending::{MemoryPendingLog, PendingWriteLog}},
        dao::save_store::{SaveStore, memory::MemorySaveStore},
        stream::NoopPublisher,
    };

    struct Fixture {
        dispatcher: EventDispatcher,
        characteristics_cache: Arc<MemoryCache<Characteristics>>,
        metadata_cache: Arc<MemoryCache<GameMetadata>>,
        pending: MemoryPendingLog,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn SaveStore> = Arc::new(MemorySaveStore::new());
        let characteristics_cache = Arc::new(MemoryCache::<Characteristics>::new(0));
        let currency_cache = Arc::new(MemoryCache::<Currency>::new(0));
        let stage_cache = Arc::new(MemoryCache::<Stage>::new(0));
        let metadata_cache = Arc::new(MemoryCache::<GameMetadata>::new(0));
        let manager = Arc::new(CacheManager::new(
            characteristics_cache.clone(),
            currency_cache.clone(),
            stage_cache.clone(),
            metadata_cache.clone(),
            true,
        ));
        let pending = MemoryPendingLog::new();
        let publisher: Arc<dyn crate::stream::EventPublisher> = Arc::new(NoopPublisher);

        let characteristics = Arc::new(SaveDataService::new(
            store.clone(),
            characteristics_cache.clone(),
            manager.clone(),
            publisher.clone(),
            Arc::new(pending.clone()),
        ));
        let currency = Arc::new(SaveDataService::new(
            store.clone(),
            currency_cache,
            manager.clone(),
            publisher.clone(),
            Arc::new(pending.clone()),
        ));
        let stage = Arc::new(SaveDataService::new(
            store,
            stage_cache,
            manager,
            publisher,
            Arc::new(pending.clone()),
        ));
        let dispatcher = EventDispatcher::new(
            characteristics,
            currency,
            stage,
            metadata_cache.clone(),
        );
        Fixture {
            dispatcher,
            characteristics_cache,
            metadata_cache,
            pending,
        }
    }

    fn characteristics_event(id: Uuid, attack: i64) -> SaveEvent {
        SaveEvent::new(
            SaveEventKind::CharacteristicsUpdated,
            id,
            "a@x.com".into(),
            serde_json::json!({ "attack": attack }),
        )
    }

    #[tokio::test]
    async fn dispatch_merges_the_update_into_the_local_cache() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.characteristics_cache
            .set(
                id,
                Characteristics {
                    health: Some(50),
                    ..Default::default()
                },
            )
            .await;

        fx.dispatcher
            .dispatch(&characteristics_event(id, 7))
            .await
            .unwrap();

        let cached = fx.characteristics_cache.get(id).await.unwrap();
        assert_eq!(cached.attack, Some(7));
        assert_eq!(cached.health, Some(50));
        // Durability stays with the originating instance.
        assert!(fx.pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_delivery_converges_to_the_same_state() {
        let fx = fixture();
        let id = Uuid::new_v4();
        let event = characteristics_event(id, 3);

        fx.dispatcher.dispatch(&event).await.unwrap();
        let first = fx.characteristics_cache.get(id).await.unwrap();
        fx.dispatcher.dispatch(&event).await.unwrap();
        let second = fx.characteristics_cache.get(id).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn metadata_event_updates_only_an_existing_cache_entry() {
        let fx = fixture();
        let id = Uuid::new_v4();
        let event = SaveEvent::new(
            SaveEventKind::MetadataUpdated,
            id,
            "a@x.com".into(),
            serde_json::json!({ "nickname": "legend" }),
        );

        // Miss: nothing to refresh, nothing cached afterwards.
        fx.dispatcher.dispatch(&event).await.unwrap();
        assert!(fx.metadata_cache.get(id).await.is_none());

        fx.metadata_cache
            .set(id, GameMetadata::new(id, "a@x.com".into(), Some("hero".into())))
            .await;
        fx.dispatcher.dispatch(&event).await.unwrap();
        assert_eq!(
            fx.metadata_cache.get(id).await.unwrap().nickname.as_deref(),
            Some("legend")
        );
    }

    #[tokio::test]
    async fn undecodable_payload_is_an_input_error() {
        let fx = fixture();
        let event = SaveEvent::new(
            SaveEventKind::CurrencyUpdated,
            Uuid::new_v4(),
            "a@x.com".into(),
            serde_json::json!("not an object"),
        );
        let err = fx.dispatcher.dispatch(&event).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
