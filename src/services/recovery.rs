//! Startup flush recovery.
//!
//! The cache tier is not crash-durable: a hard kill between "write accepted
//! into cache" and the next scheduled flush would silently lose the write.
//! Before accepting traffic, each instance replays whatever the pending log
//! still records from the previous run.

use tracing::info;

use crate::services::flush::FlushService;

/// Flush every save id left pending by a prior instance. Individual
/// failures are logged and the id stays pending for the scheduler; recovery
/// itself never aborts startup.
pub async fn run(flush: &FlushService) -> usize {
    let recovered = flush.flush_all().await;
    if recovered > 0 {
        info!(recovered, "replayed unflushed cache writes from previous run");
    } else {
        info!("no pending cache writes to recover");
    }
    recovered
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        cache::{CachePort, memory::MemoryCache, pending::{MemoryPendingLog, PendingWriteLog}},
        dao::save_store::{SaveStore, memory::MemorySaveStore},
        domain::{Characteristics, Currency, Stage},
    };

    #[tokio::test]
    async fn recovery_replays_pending_writes_into_the_store() {
        let store = MemorySaveStore::new();
        let characteristics = Arc::new(MemoryCache::<Characteristics>::new(0));
        let pending = MemoryPendingLog::new();
        let flush = FlushService::new(
            Arc::new(store.clone()),
            characteristics.clone(),
            Arc::new(MemoryCache::<Currency>::new(0)),
            Arc::new(MemoryCache::<Stage>::new(0)),
            Arc::new(pending.clone()),
        );

        // Simulate the state a crashed instance leaves behind: a cached
        // write, a pending mark, and an unchanged store row.
        let id = Uuid::new_v4();
        store
            .create_characteristics(id, Characteristics::complete(10, 0, 0, 100, 5))
            .await
            .unwrap();
        characteristics
            .set(
                id,
                Characteristics {
                    attack: Some(20),
                    ..Default::default()
                },
            )
            .await;
        pending.mark(id).await;

        assert_eq!(run(&flush).await, 1);

        // A direct store read (bypassing cache) confirms durability.
        assert_eq!(
            store.find_characteristics(id).await.unwrap().unwrap(),
            Characteristics::complete(20, 0, 0, 100, 5)
        );
        assert!(pending.all().await.is_empty());
    }

    #[tokio::test]
    async fn recovery_with_nothing_pending_is_a_noop() {
        let store = MemorySaveStore::new();
        let flush = FlushService::new(
            Arc::new(store),
            Arc::new(MemoryCache::<Characteristics>::new(0)),
            Arc::new(MemoryCache::<Currency>::new(0)),
            Arc::new(MemoryCache::<Stage>::new(0)),
            Arc::new(MemoryPendingLog::new()),
        );
        assert_eq!(run(&flush).await, 0);
    }
}
