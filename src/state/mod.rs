use std::sync::Arc;

use crate::{
    cache::CacheManager,
    config::AppConfig,
    dao::save_store::SaveStore,
    domain::{Characteristics, Currency, Stage},
    services::{
        flush::FlushService, game_save_service::GameSaveService, ownership::OwnershipService,
        save_data::SaveDataService,
    },
};

pub type SharedState = Arc<AppState>;

/// Central application state holding the wired service graph.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn SaveStore>,
    manager: Arc<CacheManager>,
    characteristics: Arc<SaveDataService<Characteristics>>,
    currency: Arc<SaveDataService<Currency>>,
    stage: Arc<SaveDataService<Stage>>,
    ownership: Arc<OwnershipService>,
    game_saves: Arc<GameSaveService>,
    flush: Arc<FlushService>,
}

impl AppState {
    /// Wrap the wired services into a shareable state handle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SaveStore>,
        manager: Arc<CacheManager>,
        characteristics: Arc<SaveDataService<Characteristics>>,
        currency: Arc<SaveDataService<Currency>>,
        stage: Arc<SaveDataService<Stage>>,
        ownership: Arc<OwnershipService>,
        game_saves: Arc<GameSaveService>,
        flush: Arc<FlushService>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            manager,
            characteristics,
            currency,
            stage,
            ownership,
            game_saves,
            flush,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Authoritative store handle, used directly by the health check.
    pub fn store(&self) -> &Arc<dyn SaveStore> {
        &self.store
    }

    /// Cache tier toggle and invalidation entry point.
    pub fn cache_manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Cache-or-store path for the characteristics sub-entity.
    pub fn characteristics(&self) -> &Arc<SaveDataService<Characteristics>> {
        &self.characteristics
    }

    /// Cache-or-store path for the currency sub-entity.
    pub fn currency(&self) -> &Arc<SaveDataService<Currency>> {
        &self.currency
    }

    /// Cache-or-store path for the stage sub-entity.
    pub fn stage(&self) -> &Arc<SaveDataService<Stage>> {
        &self.stage
    }

    /// Ownership resolution for access checks.
    pub fn ownership(&self) -> &Arc<OwnershipService> {
        &self.ownership
    }

    /// Save lifecycle orchestration.
    pub fn game_saves(&self) -> &Arc<GameSaveService> {
        &self.game_saves
    }

    /// Flush coordination for cached writes.
    pub fn flush(&self) -> &Arc<FlushService> {
        &self.flush
    }
}
