use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Referenced save id or sub-entity record does not exist in the store.
    #[error("not found: {0}")]
    NotFound(String),
    /// Ownership mismatch between the caller and the save.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Malformed id, all-absent update payload, or otherwise invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Save id or nickname collides with an existing save.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Store backend failure on the authoritative path.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
}

impl ServiceError {
    /// Not-found error for a sub-entity record of one save.
    pub fn record_not_found(entity: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{entity} for game save `{id}` not found"))
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingRecord { entity, id } => {
                ServiceError::record_not_found(entity, id)
            }
            StorageError::DuplicateRecord { entity, id } => ServiceError::Conflict(format!(
                "{entity} record for game save `{id}` already exists"
            )),
            err @ StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid admin token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is not the owner of the targeted save.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with existing state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Store unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            // Do not leak backend details to the client; the source chain is
            // logged where the failure happened.
            ServiceError::Unavailable(_) => {
                AppError::ServiceUnavailable("storage unavailable".into())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
