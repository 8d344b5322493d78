//! TTL key/value cache tier sitting in front of the relational store.
//!
//! The cache is a best-effort accelerator, never the system of record when
//! disabled: backend failures are logged and degrade to a miss or a dropped
//! write instead of failing the request.

pub mod manager;
pub mod memory;
pub mod pending;
pub mod valkey;

use futures::future::BoxFuture;
use uuid::Uuid;

pub use manager::CacheManager;

/// Cache port for one sub-entity type, keyed by game-save id.
///
/// TTL expiration of a key is equivalent to "no cached value"; callers that
/// need durability must flush before relying on expiry.
pub trait CachePort<T>: Send + Sync {
    /// Cached value for the save id, if any.
    fn get(&self, id: Uuid) -> BoxFuture<'static, Option<T>>;
    /// Store a value under the save id with the port's configured TTL.
    fn set(&self, id: Uuid, value: T) -> BoxFuture<'static, ()>;
    /// Drop the entry for the save id.
    fn delete(&self, id: Uuid) -> BoxFuture<'static, ()>;
    /// Every live entry of this port, for admin and test tooling.
    fn get_all(&self) -> BoxFuture<'static, Vec<(Uuid, T)>>;
    /// Drop every entry of this port.
    fn clear(&self) -> BoxFuture<'static, ()>;
    /// Per-port enabled flag, mirrored from the global toggle.
    fn is_enabled(&self) -> bool;
    /// Flip the per-port flag. A disabled port answers every read with a
    /// miss and drops writes.
    fn set_enabled(&self, enabled: bool);
}
