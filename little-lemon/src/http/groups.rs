//! Staff group endpoints. Administrators list and add members of `Manager` and `Delivery crew`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

use super::auth::{ensure, require_caller};
use super::error::ApiError;
use super::payloads::{ApiJson, GroupMemberPayload, MemberResponse, MessageResponse};
use super::state::AppState;
use crate::roles::Group;

pub async fn list_managers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    list_members(&state, &headers, Group::Manager).await
}

pub async fn list_delivery_crew(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    list_members(&state, &headers, Group::DeliveryCrew).await
}

/// Responds 201 with an empty body.
pub async fn add_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<GroupMemberPayload>, ApiError>,
) -> Result<Response, ApiError> {
    add_member(&state, &headers, payload, Group::Manager).await?;
    Ok(StatusCode::CREATED.into_response())
}

/// Responds 201 with a confirmation message.
pub async fn add_delivery_crew(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<GroupMemberPayload>, ApiError>,
) -> Result<Response, ApiError> {
    add_member(&state, &headers, payload, Group::DeliveryCrew).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User added to Delivery crew group",
        }),
    )
        .into_response())
}

async fn add_member(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<ApiJson<GroupMemberPayload>, ApiError>,
    group: Group,
) -> Result<(), ApiError> {
    let caller = require_caller(state, headers).await?;
    ensure(caller.can_manage_groups(), &caller)?;
    let ApiJson(payload) = payload?;

    let user_id = payload
        .user_id()
        .ok_or_else(|| ApiError::BadRequest(String::from("user_id is required")))?;
    let user = state
        .db
        .users()
        .get(user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    state.db.users().add_to_group(user.id, group).await?;
    info!(
        user_id = user.id,
        group = group.as_str(),
        by = caller.id(),
        "user added to group"
    );
    Ok(())
}

async fn list_members(
    state: &AppState,
    headers: &HeaderMap,
    group: Group,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let caller = require_caller(state, headers).await?;
    ensure(caller.can_manage_groups(), &caller)?;

    let members = state.db.users().members_of(group).await?;
    Ok(Json(
        members
            .into_iter()
            .map(|user| MemberResponse {
                id: user.id,
                username: user.username,
            })
            .collect(),
    ))
}
