use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::save::{
        CharacteristicsPayload, CreateSaveRequest, CurrencyPayload, GameSaveResponse,
        MetadataResponse, NicknameUpdateRequest, StagePayload,
    },
    error::AppError,
    services::game_save_service::CreateSaveCommand,
    state::SharedState,
};

const USER_EMAIL_HEADER: &str = "x-user-email";

/// Save lifecycle and sub-entity endpoints for game clients.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/saves", post(create_save))
        .route("/api/saves/{id}", get(get_save).delete(delete_save))
        .route("/api/saves/{id}/nickname", put(update_nickname))
        .route(
            "/api/saves/{id}/characteristics",
            get(get_characteristics).post(save_characteristics),
        )
        .route(
            "/api/saves/{id}/currency",
            get(get_currency).post(save_currency),
        )
        .route("/api/saves/{id}/stage", get(get_stage).post(save_stage))
}

/// Caller identity claimed through the `x-user-email` header.
fn user_email(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_owned())
        .ok_or_else(|| AppError::BadRequest("missing `x-user-email` header".into()))
}

/// Create a new game save with complete sub-entity rows.
pub async fn create_save(
    State(state): State<SharedState>,
    Valid(Json(body)): Valid<Json<CreateSaveRequest>>,
) -> Result<(StatusCode, Json<GameSaveResponse>), AppError> {
    let save = state
        .game_saves()
        .create(CreateSaveCommand {
            id: body.id,
            user_email: body.user_email,
            nickname: body.nickname,
            characteristics: body.characteristics.map(Into::into),
            currency: body.currency.map(Into::into),
            stage: body.stage.map(Into::into),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(save.into())))
}

/// Retrieve the full save, every facet resolved through its own
/// cache-or-store path.
pub async fn get_save(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<GameSaveResponse>, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let save = state.game_saves().get(id).await?;
    Ok(Json(save.into()))
}

/// Delete the save after flushing any cached writes.
pub async fn delete_save(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    state.game_saves().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rename the save.
pub async fn update_nickname(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Valid(Json(body)): Valid<Json<NicknameUpdateRequest>>,
) -> Result<Json<MetadataResponse>, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let metadata = state
        .game_saves()
        .update_nickname(id, body.nickname)
        .await?;
    Ok(Json(metadata.into()))
}

/// Current characteristics of the save.
pub async fn get_characteristics(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<CharacteristicsPayload>, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let record = state.characteristics().get(id).await?;
    Ok(Json(record.into()))
}

/// Apply a partial characteristics update.
pub async fn save_characteristics(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Valid(Json(body)): Valid<Json<CharacteristicsPayload>>,
) -> Result<StatusCode, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let to_cache = state.cache_manager().is_enabled();
    state
        .characteristics()
        .save(id, body.into(), to_cache, &email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current currency balances of the save.
pub async fn get_currency(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<CurrencyPayload>, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let record = state.currency().get(id).await?;
    Ok(Json(record.into()))
}

/// Apply a partial currency update.
pub async fn save_currency(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Valid(Json(body)): Valid<Json<CurrencyPayload>>,
) -> Result<StatusCode, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let to_cache = state.cache_manager().is_enabled();
    state
        .currency()
        .save(id, body.into(), to_cache, &email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current stage progress of the save.
pub async fn get_stage(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<StagePayload>, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let record = state.stage().get(id).await?;
    Ok(Json(record.into()))
}

/// Apply a partial stage update.
pub async fn save_stage(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Valid(Json(body)): Valid<Json<StagePayload>>,
) -> Result<StatusCode, AppError> {
    let email = user_email(&headers)?;
    state.ownership().check(id, &email).await?;
    let to_cache = state.cache_manager().is_enabled();
    state
        .stage()
        .save(id, body.into(), to_cache, &email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
