//! In-memory reference implementation of [`SaveStore`].
//!
//! Backs local development and the service-level tests; a relational backend
//! plugs in behind the same trait without touching the services.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        save_store::SaveStore,
        storage::{StorageError, StorageResult},
    },
    domain::{Characteristics, Currency, GameMetadata, Mergeable, Stage},
};

#[derive(Default)]
struct Tables {
    metadata: DashMap<Uuid, GameMetadata>,
    characteristics: DashMap<Uuid, Characteristics>,
    currency: DashMap<Uuid, Currency>,
    stage: DashMap<Uuid, Stage>,
}

/// Thread-safe in-memory save store.
#[derive(Clone, Default)]
pub struct MemorySaveStore {
    tables: Arc<Tables>,
}

impl MemorySaveStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn create_row<T: Clone + Send + 'static>(
    rows: &DashMap<Uuid, T>,
    entity: &'static str,
    id: Uuid,
    value: T,
) -> StorageResult<T> {
    if rows.contains_key(&id) {
        return Err(StorageError::duplicate(entity, id));
    }
    rows.insert(id, value.clone());
    Ok(value)
}

fn update_row<T: Mergeable + Clone + Send + 'static>(
    rows: &DashMap<Uuid, T>,
    entity: &'static str,
    id: Uuid,
    update: &T,
) -> StorageResult<()> {
    let mut row = rows
        .get_mut(&id)
        .ok_or_else(|| StorageError::missing(entity, id))?;
    // Single atomic replacement of the merged row; concurrent flushes and
    // writers can interleave but never produce a hybrid record.
    *row = T::merge(&row, update);
    Ok(())
}

impl SaveStore for MemorySaveStore {
    fn find_characteristics(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Characteristics>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.characteristics.get(&id).map(|row| row.clone())) })
    }

    fn create_characteristics(
        &self,
        id: Uuid,
        value: Characteristics,
    ) -> BoxFuture<'static, StorageResult<Characteristics>> {
        let tables = self.tables.clone();
        Box::pin(async move { create_row(&tables.characteristics, "characteristics", id, value) })
    }

    fn update_characteristics(
        &self,
        id: Uuid,
        update: Characteristics,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move { update_row(&tables.characteristics, "characteristics", id, &update) })
    }

    fn find_currency(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Currency>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.currency.get(&id).map(|row| row.clone())) })
    }

    fn create_currency(
        &self,
        id: Uuid,
        value: Currency,
    ) -> BoxFuture<'static, StorageResult<Currency>> {
        let tables = self.tables.clone();
        Box::pin(async move { create_row(&tables.currency, "currency", id, value) })
    }

    fn update_currency(
        &self,
        id: Uuid,
        update: Currency,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move { update_row(&tables.currency, "currency", id, &update) })
    }

    fn find_stage(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Stage>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.stage.get(&id).map(|row| row.clone())) })
    }

    fn create_stage(&self, id: Uuid, value: Stage) -> BoxFuture<'static, StorageResult<Stage>> {
        let tables = self.tables.clone();
        Box::pin(async move { create_row(&tables.stage, "stage", id, value) })
    }

    fn update_stage(&self, id: Uuid, update: Stage) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move { update_row(&tables.stage, "stage", id, &update) })
    }

    fn find_metadata(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameMetadata>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.metadata.get(&id).map(|row| row.clone())) })
    }

    fn create_metadata(
        &self,
        metadata: GameMetadata,
    ) -> BoxFuture<'static, StorageResult<GameMetadata>> {
        let tables = self.tables.clone();
        Box::pin(async move { create_row(&tables.metadata, "metadata", metadata.id, metadata) })
    }

    fn update_nickname(
        &self,
        id: Uuid,
        nickname: String,
    ) -> BoxFuture<'static, StorageResult<GameMetadata>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut row = tables
                .metadata
                .get_mut(&id)
                .ok_or_else(|| StorageError::missing("metadata", id))?;
            row.nickname = Some(nickname);
            row.updated_at = time::OffsetDateTime::now_utc();
            Ok(row.clone())
        })
    }

    fn exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.metadata.contains_key(&id)) })
    }

    fn nickname_taken(&self, nickname: String) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Ok(tables
                .metadata
                .iter()
                .any(|row| row.nickname.as_deref() == Some(nickname.as_str())))
        })
    }

    fn delete_save(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            tables.characteristics.remove(&id);
            tables.currency.remove(&id);
            tables.stage.remove(&id);
            tables.metadata.remove(&id);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
