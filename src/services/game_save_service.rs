//! Lifecycle orchestration for whole game saves: creation, full reads,
//! nickname updates, and deletion across every sub-entity.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    cache::{CacheManager, CachePort},
    dao::save_store::SaveStore,
    domain::{Characteristics, Currency, GameMetadata, GameSave, Stage},
    error::ServiceError,
    services::{flush::FlushService, ownership::OwnershipService, save_data::SaveDataService},
    stream::{EventPublisher, SaveEvent, SaveEventKind},
};

/// Caller-supplied inputs for save creation. Omitted sub-entities fall back
/// to their hard-coded defaults; creation always writes complete rows.
#[derive(Debug, Default)]
pub struct CreateSaveCommand {
    pub id: Option<Uuid>,
    pub user_email: String,
    pub nickname: Option<String>,
    pub characteristics: Option<Characteristics>,
    pub currency: Option<Currency>,
    pub stage: Option<Stage>,
}

/// Entry point for save-level operations spanning all sub-entities.
pub struct GameSaveService {
    store: Arc<dyn SaveStore>,
    characteristics: Arc<SaveDataService<Characteristics>>,
    currency: Arc<SaveDataService<Currency>>,
    stage: Arc<SaveDataService<Stage>>,
    ownership: Arc<OwnershipService>,
    metadata_cache: Arc<dyn CachePort<GameMetadata>>,
    manager: Arc<CacheManager>,
    flush: Arc<FlushService>,
    publisher: Arc<dyn EventPublisher>,
}

impl GameSaveService {
    /// Wire the orchestrator over the per-aggregate services and ports.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SaveStore>,
        characteristics: Arc<SaveDataService<Characteristics>>,
        currency: Arc<SaveDataService<Currency>>,
        stage: Arc<SaveDataService<Stage>>,
        ownership: Arc<OwnershipService>,
        metadata_cache: Arc<dyn CachePort<GameMetadata>>,
        manager: Arc<CacheManager>,
        flush: Arc<FlushService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            characteristics,
            currency,
            stage,
            ownership,
            metadata_cache,
            manager,
            flush,
            publisher,
        }
    }

    /// Create a save: one metadata row plus complete rows for every
    /// sub-entity.
    pub async fn create(&self, command: CreateSaveCommand) -> Result<GameSave, ServiceError> {
        let id = command.id.unwrap_or_else(Uuid::new_v4);
        if self.store.exists(id).await? {
            return Err(ServiceError::Conflict(format!(
                "game save `{id}` already exists"
            )));
        }
        if let Some(nickname) = &command.nickname {
            if self.store.nickname_taken(nickname.clone()).await? {
                return Err(ServiceError::Conflict(format!(
                    "nickname `{nickname}` is already taken"
                )));
            }
        }

        let metadata = self
            .store
            .create_metadata(GameMetadata::new(id, command.user_email, command.nickname))
            .await?;

        let characteristics = match command.characteristics {
            Some(values) => self.characteristics.initialize(id, values).await?,
            None => self.characteristics.initialize_default(id).await?,
        };
        let currency = match command.currency {
            Some(values) => self.currency.initialize(id, values).await?,
            None => self.currency.initialize_default(id).await?,
        };
        let stage = match command.stage {
            Some(values) => self.stage.initialize(id, values).await?,
            None => self.stage.initialize_default(id).await?,
        };

        info!(save_id = %id, "created game save");
        Ok(GameSave {
            metadata,
            characteristics,
            currency,
            stage,
        })
    }

    /// Full view of one save, each facet resolved through its own
    /// cache-or-store path.
    pub async fn get(&self, id: Uuid) -> Result<GameSave, ServiceError> {
        let metadata = self.ownership.metadata(id).await?;
        let characteristics = self.characteristics.get(id).await?;
        let currency = self.currency.get(id).await?;
        let stage = self.stage.get(id).await?;
        Ok(GameSave {
            metadata,
            characteristics,
            currency,
            stage,
        })
    }

    /// Rename the save. In cache mode the refreshed metadata replaces the
    /// ownership cache entry and the change is propagated to other
    /// instances.
    pub async fn update_nickname(
        &self,
        id: Uuid,
        nickname: String,
    ) -> Result<GameMetadata, ServiceError> {
        if self.store.nickname_taken(nickname.clone()).await? {
            return Err(ServiceError::Conflict(format!(
                "nickname `{nickname}` is already taken"
            )));
        }
        let metadata = self.store.update_nickname(id, nickname.clone()).await?;

        if self.manager.is_enabled() {
            self.metadata_cache.set(id, metadata.clone()).await;
            self.publisher
                .publish(SaveEvent::new(
                    SaveEventKind::MetadataUpdated,
                    id,
                    metadata.user_email.clone(),
                    serde_json::json!({ "nickname": nickname }),
                ))
                .await;
        }
        Ok(metadata)
    }

    /// Delete the save and everything attached to it.
    ///
    /// Cached writes are flushed (and cleared) first so nothing is lost,
    /// then every cache entry for the id is invalidated before the store
    /// rows go away; no orphaned cache keys survive.
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.exists(id).await? {
            return Err(ServiceError::NotFound(format!(
                "game save `{id}` not found"
            )));
        }
        self.flush.flush_save(id, true).await?;
        self.manager.clear_save(id).await;
        self.store.delete_save(id).await?;
        info!(save_id = %id, "deleted game save");
        Ok(())
    }
}
