/// Cache flush and persistence coordination.
pub mod flush;
/// Save lifecycle orchestration across sub-entities.
pub mod game_save_service;
/// Ownership resolution and access checks.
pub mod ownership;
/// Startup replay of unflushed cache writes.
pub mod recovery;
/// Cache-or-store read and write paths for save sub-entities.
pub mod save_data;
/// WebSocket connection and update-message handling.
pub mod websocket_service;
