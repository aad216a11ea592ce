//! `/categories/`: administrators only, for reads as well as writes.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::info;

use super::auth::{ensure, require_caller};
use super::error::ApiError;
use super::payloads::{ApiJson, ApiPath, CategoryPayload};
use super::state::AppState;
use crate::models::Category;
use crate::roles::Caller;

async fn admin(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let caller = require_caller(state, headers).await?;
    ensure(caller.can_manage_catalog(), &caller)?;
    Ok(caller)
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Category>>, ApiError> {
    admin(&state, &headers).await?;
    Ok(Json(state.db.categories().list().await?))
}

pub async fn retrieve(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<Json<Category>, ApiError> {
    admin(&state, &headers).await?;
    let ApiPath(id) = path?;
    let category = state
        .db
        .categories()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(category))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<CategoryPayload>, ApiError>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let caller = admin(&state, &headers).await?;
    let ApiJson(payload) = payload?;

    let name = payload.into_name(None)?;
    let category = state.db.categories().create(&name).await?;
    info!(category_id = category.id, user_id = caller.id(), "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn replace(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<CategoryPayload>, ApiError>,
) -> Result<Json<Category>, ApiError> {
    admin(&state, &headers).await?;
    let ApiPath(id) = path?;
    let ApiJson(payload) = payload?;

    state
        .db
        .categories()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let name = payload.into_name(None)?;
    rename(&state, id, &name).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<CategoryPayload>, ApiError>,
) -> Result<Json<Category>, ApiError> {
    admin(&state, &headers).await?;
    let ApiPath(id) = path?;
    let ApiJson(payload) = payload?;

    let current = state
        .db
        .categories()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let name = payload.into_name(Some(&current))?;
    rename(&state, id, &name).await
}

/// Deleting a category also deletes its menu items.
pub async fn destroy(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = admin(&state, &headers).await?;
    let ApiPath(id) = path?;
    if !state.db.categories().delete(id).await? {
        return Err(ApiError::not_found());
    }
    info!(category_id = id, user_id = caller.id(), "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn rename(state: &AppState, id: i64, name: &str) -> Result<Json<Category>, ApiError> {
    let category = state
        .db
        .categories()
        .update(id, name)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(category))
}
