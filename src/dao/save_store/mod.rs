pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::storage::StorageResult,
    domain::{Characteristics, Currency, GameMetadata, Stage},
};

/// Abstraction over the relational store holding the authoritative game-save
/// rows. The store only ever persists complete sub-entity records; partial
/// updates touch the provided columns and leave the rest of the row alone.
pub trait SaveStore: Send + Sync {
    fn find_characteristics(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Characteristics>>>;
    fn create_characteristics(
        &self,
        id: Uuid,
        value: Characteristics,
    ) -> BoxFuture<'static, StorageResult<Characteristics>>;
    fn update_characteristics(
        &self,
        id: Uuid,
        update: Characteristics,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn find_currency(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Currency>>>;
    fn create_currency(
        &self,
        id: Uuid,
        value: Currency,
    ) -> BoxFuture<'static, StorageResult<Currency>>;
    fn update_currency(&self, id: Uuid, update: Currency)
    -> BoxFuture<'static, StorageResult<()>>;

    fn find_stage(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Stage>>>;
    fn create_stage(&self, id: Uuid, value: Stage) -> BoxFuture<'static, StorageResult<Stage>>;
    fn update_stage(&self, id: Uuid, update: Stage) -> BoxFuture<'static, StorageResult<()>>;

    fn find_metadata(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameMetadata>>>;
    fn create_metadata(
        &self,
        metadata: GameMetadata,
    ) -> BoxFuture<'static, StorageResult<GameMetadata>>;
    /// Replace the nickname on the metadata row, returning the updated
    /// record.
    fn update_nickname(
        &self,
        id: Uuid,
        nickname: String,
    ) -> BoxFuture<'static, StorageResult<GameMetadata>>;
    fn exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn nickname_taken(&self, nickname: String) -> BoxFuture<'static, StorageResult<bool>>;

    /// Delete every row belonging to the save id.
    fn delete_save(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
