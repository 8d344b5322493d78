//! Domain value types for the mutable facets of a game save, plus the merge
//! policy that resolves partial updates against a better-known record.

pub mod characteristics;
pub mod currency;
pub mod metadata;
pub mod stage;

pub use characteristics::Characteristics;
pub use currency::Currency;
pub use metadata::GameMetadata;
pub use stage::Stage;

use serde::{Deserialize, Serialize};

/// Full view of one game save, assembled from its independently cached and
/// stored facets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSave {
    pub metadata: GameMetadata,
    pub characteristics: Characteristics,
    pub currency: Currency,
    pub stage: Stage,
}

/// Field-level merge policy shared by every cached sub-entity.
///
/// A record is *partial* when at least one field is unset and *complete* when
/// every required field is set. The store only ever holds complete records;
/// the cache may hold partial ones, which get healed on read by merging
/// against the store row.
pub trait Mergeable: Sized {
    /// Combine `update` with `existing`, field by field. A present field in
    /// `update` wins; an absent one falls through to `existing`.
    fn merge(existing: &Self, update: &Self) -> Self;

    /// True when every required field is present.
    fn is_complete(&self) -> bool;

    /// True when every field is absent. All-empty updates are rejected
    /// before touching cache or store.
    fn is_empty(&self) -> bool;
}
