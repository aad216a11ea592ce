//! `/orders/`: any signed-in caller, with delivery assignment reserved for
//! managers and status changes for the assigned crew member.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::{debug, info, warn};

use super::auth::require_caller;
use super::error::ApiError;
use super::payloads::{
    ApiJson, ApiPath, AssignCrewPayload, MessageResponse, OrderPayload, OrderStatusPayload,
};
use super::state::AppState;
use crate::db::NewOrder;
use crate::models::Order;
use crate::roles::Caller;

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Order>>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let scope = caller.order_scope();
    let orders = state.db.orders().list(scope).await?;
    debug!(orders = orders.len(), ?scope, "orders listed");
    Ok(Json(orders))
}

pub async fn retrieve(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<Json<Order>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiPath(id) = path?;
    Ok(Json(scoped_order(&state, &caller, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<OrderPayload>, ApiError>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiJson(payload) = payload?;

    let new_order = payload.into_new_order(caller.id())?;
    check_references(&state, &new_order).await?;
    let order = state.db.orders().create(&new_order).await?;
    info!(
        order_id = order.id,
        customer_id = order.customer_id,
        items = order.items.len(),
        "order created"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT: a manager assigns the delivery crew member. The order is looked up in
/// the caller's scope, so a manager who also delivers only reaches their own.
pub async fn assign_delivery_crew(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<AssignCrewPayload>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    if !caller.can_assign_delivery() {
        warn!(user_id = caller.id(), "delivery assignment denied");
        return Err(ApiError::Forbidden(None));
    }
    let ApiPath(id) = path?;
    let ApiJson(payload) = payload?;

    scoped_order(&state, &caller, id).await?;
    let crew_id = payload
        .crew_id()
        .ok_or_else(|| ApiError::BadRequest(String::from("delivery_crew_id is required")))?;
    let crew = state
        .db
        .users()
        .get(crew_id)
        .await?
        .ok_or(ApiError::NotFound("Delivery crew not found"))?;

    if !state.db.orders().set_delivery_crew(id, crew.id).await? {
        return Err(ApiError::not_found());
    }
    info!(order_id = id, delivery_crew_id = crew.id, "delivery crew assigned");
    Ok(Json(MessageResponse {
        message: "Delivery crew assigned successfully",
    }))
}

/// PATCH: the crew member assigned to this order updates its status.
pub async fn update_status(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
    payload: Result<ApiJson<OrderStatusPayload>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiPath(id) = path?;
    let order = state
        .db
        .orders()
        .get(id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    if !caller.can_update_status(&order) {
        warn!(user_id = caller.id(), order_id = id, "status update denied");
        return Err(ApiError::Forbidden(Some(
            "You are not authorized to update this order",
        )));
    }
    let ApiJson(payload) = payload?;

    let status = payload.status.unwrap_or(order.status);
    state.db.orders().set_status(id, status).await?;
    info!(order_id = id, status, "order status updated");
    Ok(Json(MessageResponse {
        message: "Order status updated successfully",
    }))
}

pub async fn destroy(
    State(state): State<AppState>,
    path: Result<ApiPath<i64>, ApiError>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let ApiPath(id) = path?;
    let order = scoped_order(&state, &caller, id).await?;
    state.db.orders().delete(order.id).await?;
    info!(order_id = id, user_id = caller.id(), "order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Orders outside the caller's scope are reported as missing.
async fn scoped_order(state: &AppState, caller: &Caller, id: i64) -> Result<Order, ApiError> {
    state
        .db
        .orders()
        .get(id)
        .await?
        .filter(|order| caller.order_scope().admits(order))
        .ok_or_else(ApiError::not_found)
}

async fn check_references(state: &AppState, order: &NewOrder) -> Result<(), ApiError> {
    if state.db.users().get(order.customer_id).await?.is_none() {
        return Err(ApiError::invalid_pk("customer_id", order.customer_id));
    }
    if let Some(crew_id) = order.delivery_crew_id {
        if state.db.users().get(crew_id).await?.is_none() {
            return Err(ApiError::invalid_pk("delivery_crew_id", crew_id));
        }
    }
    for item in &order.items {
        if !state.db.menu_items().exists(*item).await? {
            return Err(ApiError::invalid_pk("items", *item));
        }
    }
    Ok(())
}
