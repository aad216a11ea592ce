//! `/cart/menu-items/`: every query is scoped to the caller's own rows.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::{debug, info};

use super::auth::require_caller;
use super::error::ApiError;
use super::payloads::{ApiJson, ApiPath, CartPayload};
use super::state::AppState;
use crate::db::{CartFields, RepositoryError};
use crate::models::CartItem;

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let rows = state.db.cart().list_for_user(caller.id()).await?;
    debug!(user_id = caller.id(), rows = rows.len(), "cart listed");
    Ok(Json(rows))
}

pub async fn retrieve(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<Json<CartItem>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiPath(id) = path?;
    let row = state
        .db
        .cart()
        .get_for_user(id, caller.id())
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(row))
}

/// Adds a row for the caller. An unknown menu item is a 404 and writes nothing.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<CartPayload>, ApiError>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiJson(payload) = payload?;

    let menuitem_id = payload
        .menuitem_id()
        .ok_or_else(|| ApiError::BadRequest(String::from("menuitem_id is required")))?;
    let quantity = payload
        .quantity()
        .ok_or_else(|| ApiError::BadRequest(String::from("quantity is required")))?;

    if !state.db.menu_items().exists(menuitem_id).await? {
        debug!(menuitem_id, "add to cart for unknown menu item");
        return Err(ApiError::NotFound("Menu item not found"));
    }

    let row = state
        .db
        .cart()
        .create(
            caller.id(),
            CartFields {
                menuitem_id,
                quantity,
            },
        )
        .await
        .map_err(|err| match err {
            RepositoryError::MissingReference => ApiError::NotFound("Menu item not found"),
            other => other.into(),
        })?;
    info!(cart_id = row.id, user_id = caller.id(), menuitem_id, quantity, "added to cart");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn replace(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<CartPayload>, ApiError>,
) -> Result<Json<CartItem>, ApiError> {
    update(state, path, headers, payload, false).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<CartPayload>, ApiError>,
) -> Result<Json<CartItem>, ApiError> {
    update(state, path, headers, payload, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiPath(id) = path?;
    if !state.db.cart().delete_for_user(id, caller.id()).await? {
        return Err(ApiError::not_found());
    }
    debug!(cart_id = id, user_id = caller.id(), "cart row removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn update(
    state: AppState,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<CartPayload>, ApiError>,
    partial: bool,
) -> Result<Json<CartItem>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiPath(id) = path?;
    let ApiJson(payload) = payload?;

    let current = state
        .db
        .cart()
        .get_for_user(id, caller.id())
        .await?
        .ok_or_else(ApiError::not_found)?;
    let fields = payload.into_fields(partial.then_some(&current))?;

    let row = state
        .db
        .cart()
        .update_for_user(id, caller.id(), fields)
        .await
        .map_err(|err| match err {
            RepositoryError::MissingReference => {
                ApiError::invalid_pk("menuitem_id", fields.menuitem_id)
            }
            other => other.into(),
        })?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(row))
}
