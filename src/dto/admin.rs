//! Bodies for the admin cache-control surface.

use serde::Serialize;
use uuid::Uuid;

use crate::dto::save::{CharacteristicsPayload, CurrencyPayload, StagePayload};

/// Generic acknowledgement for admin actions.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: String,
}

/// Current state of the cache tier toggle.
#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub enabled: bool,
}

/// Outcome of a manual flush.
#[derive(Debug, Serialize)]
pub struct FlushResponse {
    pub flushed: usize,
}

/// One live cache entry keyed by its save id.
#[derive(Debug, Serialize)]
pub struct CacheEntryResponse<T> {
    pub game_save_id: Uuid,
    pub value: T,
}

/// Live contents of the cache tier, one list per sub-entity port.
#[derive(Debug, Serialize)]
pub struct CacheEntriesResponse {
    pub characteristics: Vec<CacheEntryResponse<CharacteristicsPayload>>,
    pub currency: Vec<CacheEntryResponse<CurrencyPayload>>,
    pub stage: Vec<CacheEntryResponse<StagePayload>>,
}
