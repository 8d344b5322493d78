//! Process-wide consistency toggle over the per-type cache ports.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::info;
use uuid::Uuid;

use crate::{
    cache::CachePort,
    domain::{Characteristics, Currency, GameMetadata, Stage},
};

/// Owner of the four sub-entity cache ports and the single routing flag that
/// decides cache-mode vs. store-direct writes.
///
/// Command paths read only [`CacheManager::is_enabled`], so a toggle is one
/// atomic store and no request can observe some sub-entities cached and
/// others not. The per-port flags are mirrored afterwards purely so each
/// port also degrades its own reads/writes.
pub struct CacheManager {
    characteristics: Arc<dyn CachePort<Characteristics>>,
    currency: Arc<dyn CachePort<Currency>>,
    stage: Arc<dyn CachePort<Stage>>,
    metadata: Arc<dyn CachePort<GameMetadata>>,
    enabled: AtomicBool,
}

impl CacheManager {
    /// Wire the manager over the four ports, seeding the toggle (and every
    /// port flag) from configuration.
    pub fn new(
        characteristics: Arc<dyn CachePort<Characteristics>>,
        currency: Arc<dyn CachePort<Currency>>,
        stage: Arc<dyn CachePort<Stage>>,
        metadata: Arc<dyn CachePort<GameMetadata>>,
        enabled: bool,
    ) -> Self {
        let manager = Self {
            characteristics,
            currency,
            stage,
            metadata,
            enabled: AtomicBool::new(enabled),
        };
        manager.mirror_to_ports(enabled);
        manager
    }

    /// Snapshot of the routing flag. Callers take this once per request so a
    /// toggle cannot split a request across both paths.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Characteristics cache port.
    pub fn characteristics(&self) -> &Arc<dyn CachePort<Characteristics>> {
        &self.characteristics
    }

    /// Currency cache port.
    pub fn currency(&self) -> &Arc<dyn CachePort<Currency>> {
        &self.currency
    }

    /// Stage cache port.
    pub fn stage(&self) -> &Arc<dyn CachePort<Stage>> {
        &self.stage
    }

    /// Flip the cache tier on or off for every sub-entity at once, returning
    /// the new state.
    pub fn toggle(&self) -> bool {
        let was_enabled = self.enabled.fetch_xor(true, Ordering::AcqRel);
        let now_enabled = !was_enabled;
        info!(
            enabled = now_enabled,
            "{} cache tier",
            if now_enabled { "enabling" } else { "disabling" }
        );
        self.mirror_to_ports(now_enabled);
        now_enabled
    }

    /// Remove every entry across all sub-entity caches. Callers that need
    /// durability must flush first; there is no implicit flush here.
    pub async fn clear_all(&self) {
        info!("clearing all caches");
        self.characteristics.clear().await;
        self.currency.clear().await;
        self.stage.clear().await;
        self.metadata.clear().await;
    }

    /// Remove every cache entry belonging to one save id, including its
    /// ownership entry. Used by the delete path so no orphaned keys survive.
    pub async fn clear_save(&self, id: Uuid) {
        self.characteristics.delete(id).await;
        self.currency.delete(id).await;
        self.stage.delete(id).await;
        self.metadata.delete(id).await;
    }

    fn mirror_to_ports(&self, enabled: bool) {
        self.characteristics.set_enabled(enabled);
        self.currency.set_enabled(enabled);
        self.stage.set_enabled(enabled);
        self.metadata.set_enabled(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;

    fn manager(enabled: bool) -> CacheManager {
        CacheManager::new(
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            Arc::new(MemoryCache::new(0)),
            enabled,
        )
    }

    #[test]
    fn toggle_moves_every_port_together() {
        let manager = manager(true);
        assert!(manager.is_enabled());
        assert!(manager.characteristics.is_enabled());
        assert!(manager.metadata.is_enabled());

        assert!(!manager.toggle());
        assert!(!manager.is_enabled());
        assert!(!manager.characteristics.is_enabled());
        assert!(!manager.currency.is_enabled());
        assert!(!manager.stage.is_enabled());
        assert!(!manager.metadata.is_enabled());

        assert!(manager.toggle());
        assert!(manager.stage.is_enabled());
    }

    #[tokio::test]
    async fn clear_save_removes_all_entries_for_one_id() {
        let manager = manager(true);
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        manager
            .characteristics
            .set(id, Characteristics::default_complete())
            .await;
        manager
            .characteristics
            .set(other, Characteristics::default_complete())
            .await;
        manager.currency.set(id, Currency::default_complete()).await;

        manager.clear_save(id).await;
        assert!(manager.characteristics.get(id).await.is_none());
        assert!(manager.currency.get(id).await.is_none());
        assert!(manager.characteristics.get(other).await.is_some());
    }
}
