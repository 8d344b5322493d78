use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by store backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("{entity} record for save `{id}` not found")]
    MissingRecord { entity: &'static str, id: Uuid },
    #[error("{entity} record for save `{id}` already exists")]
    DuplicateRecord { entity: &'static str, id: Uuid },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Missing row for the given save id.
    pub fn missing(entity: &'static str, id: Uuid) -> Self {
        StorageError::MissingRecord { entity, id }
    }

    /// Row already present for the given save id.
    pub fn duplicate(entity: &'static str, id: Uuid) -> Self {
        StorageError::DuplicateRecord { entity, id }
    }
}
