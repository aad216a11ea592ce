//! `/menu-items/`: readable by anyone, writable by administrators.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::{debug, info};

use super::auth::{authenticate, ensure, require_caller};
use super::error::ApiError;
use super::payloads::{ApiJson, ApiPath, MenuItemPayload, MenuListQuery};
use super::state::AppState;
use crate::db::{MenuItemFields, MenuOrdering, RepositoryError};
use crate::models::MenuItem;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<MenuListQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    authenticate(&state, &headers).await?;
    let ordering = MenuOrdering::from_query(query.ordering.as_deref());
    let items = state.db.menu_items().list(ordering).await?;
    debug!(items = items.len(), ?ordering, "menu items listed");
    Ok(Json(items))
}

pub async fn retrieve(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<Json<MenuItem>, ApiError> {
    authenticate(&state, &headers).await?;
    let ApiPath(id) = path?;
    let item = state
        .db
        .menu_items()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(item))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<MenuItemPayload>, ApiError>,
) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    let caller = require_caller(&state, &headers).await?;
    ensure(caller.can_manage_catalog(), &caller)?;
    let ApiJson(payload) = payload?;

    let fields = payload.into_fields(None)?;
    let item = state
        .db
        .menu_items()
        .create(&fields)
        .await
        .map_err(|err| missing_category(err, &fields))?;
    info!(menu_item_id = item.id, user_id = caller.id(), "menu item created");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn replace(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<MenuItemPayload>, ApiError>,
) -> Result<Json<MenuItem>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    ensure(caller.can_manage_catalog(), &caller)?;
    let ApiPath(id) = path?;
    let ApiJson(payload) = payload?;

    state
        .db
        .menu_items()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let fields = payload.into_fields(None)?;
    save(&state, id, &fields).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<MenuItemPayload>, ApiError>,
) -> Result<Json<MenuItem>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    ensure(caller.can_manage_catalog(), &caller)?;
    let ApiPath(id) = path?;
    let ApiJson(payload) = payload?;

    let current = state
        .db
        .menu_items()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let fields = payload.into_fields(Some(&current))?;
    save(&state, id, &fields).await
}

pub async fn destroy(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    ensure(caller.can_manage_catalog(), &caller)?;
    let ApiPath(id) = path?;

    if !state.db.menu_items().delete(id).await? {
        return Err(ApiError::not_found());
    }
    info!(menu_item_id = id, user_id = caller.id(), "menu item deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn save(state: &AppState, id: i64, fields: &MenuItemFields) -> Result<Json<MenuItem>, ApiError> {
    let item = state
        .db
        .menu_items()
        .update(id, fields)
        .await
        .map_err(|err| missing_category(err, fields))?
        .ok_or_else(ApiError::not_found)?;
    debug!(menu_item_id = id, "menu item updated");
    Ok(Json(item))
}

fn missing_category(err: RepositoryError, fields: &MenuItemFields) -> ApiError {
    match err {
        RepositoryError::MissingReference => ApiError::invalid_pk("category_id", fields.category_id),
        other => other.into(),
    }
}
