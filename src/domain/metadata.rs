//! Ownership metadata attached to every game save.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Ownership and bookkeeping record for one game save. Unlike the cached
/// sub-entities this record is never partial: the ownership cache stores it
/// whole so authorization checks can run without a store round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub id: Uuid,
    pub user_email: String,
    pub nickname: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GameMetadata {
    /// Fresh metadata record for a newly created save.
    pub fn new(id: Uuid, user_email: String, nickname: Option<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            user_email,
            nickname,
            created_at: now,
            updated_at: now,
        }
    }
}
