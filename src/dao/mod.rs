/// Relational store port for game-save rows and ownership metadata.
pub mod save_store;
/// Storage error definitions shared by every store backend.
pub mod storage;
