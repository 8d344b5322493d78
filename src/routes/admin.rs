use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::admin::{
        ActionResponse, CacheEntriesResponse, CacheEntryResponse, CacheStatusResponse,
        FlushResponse,
    },
    error::AppError,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints driving the cache tier.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/cache", delete(clear_cache))
        .route("/admin/cache/status", get(cache_status))
        .route("/admin/cache/entries", get(cache_entries))
        .route("/admin/cache/toggle", put(toggle_cache))
        .route("/admin/cache/flush", post(flush_all))
        .route("/admin/saves/{id}/flush", post(flush_save))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Report whether the cache tier is currently enabled.
pub async fn cache_status(State(state): State<SharedState>) -> Json<CacheStatusResponse> {
    Json(CacheStatusResponse {
        enabled: state.cache_manager().is_enabled(),
    })
}

/// Dump every live cache entry, for inspecting the tier after a toggle,
/// clear, or flush.
pub async fn cache_entries(State(state): State<SharedState>) -> Json<CacheEntriesResponse> {
    let manager = state.cache_manager();
    Json(CacheEntriesResponse {
        characteristics: entries(manager.characteristics().get_all().await),
        currency: entries(manager.currency().get_all().await),
        stage: entries(manager.stage().get_all().await),
    })
}

fn entries<T, P: From<T>>(raw: Vec<(Uuid, T)>) -> Vec<CacheEntryResponse<P>> {
    raw.into_iter()
        .map(|(game_save_id, value)| CacheEntryResponse {
            game_save_id,
            value: value.into(),
        })
        .collect()
}

/// Flip the cache tier toggle, returning the new state.
pub async fn toggle_cache(State(state): State<SharedState>) -> Json<CacheStatusResponse> {
    let enabled = state.cache_manager().toggle();
    Json(CacheStatusResponse { enabled })
}

/// Drop every cached entry without flushing. Unflushed writes stay pending
/// and reachable only through the store after the next flush repopulates
/// nothing; use `/admin/cache/flush` first when the writes must survive.
pub async fn clear_cache(State(state): State<SharedState>) -> Json<ActionResponse> {
    state.cache_manager().clear_all().await;
    info!("cache cleared by admin request");
    Json(ActionResponse {
        message: "cache cleared".into(),
    })
}

/// Persist every pending cached write to the store.
pub async fn flush_all(State(state): State<SharedState>) -> Json<FlushResponse> {
    let flushed = state.flush().flush_all().await;
    Json(FlushResponse { flushed })
}

/// Persist the cached writes of one save, leaving its cache entries in
/// place.
pub async fn flush_save(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    state.flush().flush_save(id, false).await?;
    Ok(Json(ActionResponse {
        message: format!("game save `{id}` flushed"),
    }))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().admin_token.as_deref() {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin surface is not configured".into(),
        )),
    }
}
