use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod health;
pub mod save;
pub mod websocket;

/// Compose all route trees, wiring in shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(save::router())
        .merge(admin::router(state.clone()));

    api_router.with_state(state)
}
