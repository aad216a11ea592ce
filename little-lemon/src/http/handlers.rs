use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, info, warn};

use super::auth::{extract_credentials, require_caller, Credentials};
use super::error::ApiError;
use super::payloads::{ApiJson, HealthResponse, LoginPayload, MeResponse, TokenResponse};
use super::state::AppState;
use super::{cart, categories, groups, menu_items, orders};

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(api_root))
        .route("/health", get(health))
        .route("/auth/token/login/", post(token_login))
        .route("/auth/token/logout/", post(token_logout))
        .route("/auth/users/me/", get(me))
        .route(
            "/menu-items/",
            get(menu_items::list).post(menu_items::create),
        )
        .route(
            "/menu-items/{id}/",
            get(menu_items::retrieve)
                .put(menu_items::replace)
                .patch(menu_items::partial_update)
                .delete(menu_items::destroy),
        )
        .route(
            "/categories/",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}/",
            get(categories::retrieve)
                .put(categories::replace)
                .patch(categories::partial_update)
                .delete(categories::destroy),
        )
        .route("/orders/", get(orders::list).post(orders::create))
        .route(
            "/orders/{id}/",
            get(orders::retrieve)
                .put(orders::assign_delivery_crew)
                .patch(orders::update_status)
                .delete(orders::destroy),
        )
        .route("/cart/menu-items/", get(cart::list).post(cart::create))
        .route(
            "/cart/menu-items/{id}/",
            get(cart::retrieve)
                .put(cart::replace)
                .patch(cart::partial_update)
                .delete(cart::destroy),
        )
        .route(
            "/groups/manager/users/",
            get(groups::list_managers).post(groups::add_manager),
        )
        .route(
            "/groups/delivery-crew/users/",
            get(groups::list_delivery_crew).post(groups::add_delivery_crew),
        );

    match GovernorConfigBuilder::default()
        .per_second(20)
        .burst_size(50)
        .key_extractor(GlobalKeyExtractor)
        .finish()
    {
        Some(governor_conf) => app = app.layer(GovernorLayer::new(Arc::new(governor_conf))),
        None => warn!("invalid rate limit configuration; serving without rate limiting"),
    }

    app.layer(
        tower_http::request_id::SetRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
            tower_http::request_id::MakeRequestUuid,
        ),
    )
    .layer(tower_http::request_id::PropagateRequestIdLayer::new(
        axum::http::header::HeaderName::from_static("x-request-id"),
    ))
    .layer(tower_http::trace::TraceLayer::new_for_http())
    .with_state(state)
}

async fn api_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "menu-items": "/menu-items/",
        "categories": "/categories/",
        "orders": "/orders/",
        "cart": "/cart/menu-items/",
        "manager-group": "/groups/manager/users/",
        "delivery-crew-group": "/groups/delivery-crew/users/",
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.db.ping().await?;
    Ok(Json(HealthResponse { status: "ok" }))
}

async fn token_login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<Json<TokenResponse>, ApiError> {
    let invalid = || ApiError::BadRequest(String::from("Unable to log in with provided credentials."));

    let (Some(username), Some(password)) = (payload.username, payload.password) else {
        return Err(ApiError::BadRequest(String::from(
            "username and password are required",
        )));
    };
    if !state.auth.is_authorized(&username, &password) {
        warn!(username = %username, "token login rejected");
        return Err(invalid());
    }
    let user = state
        .db
        .users()
        .get_by_username(&username)
        .await?
        .ok_or_else(invalid)?;

    let auth_token = state.tokens.create(user.id);
    info!(user_id = user.id, "issued auth token");
    Ok(Json(TokenResponse { auth_token }))
}

async fn token_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    if let Some(Credentials::Token(token)) = extract_credentials(&headers)? {
        state.tokens.remove(&token);
        debug!(user_id = caller.id(), "auth token revoked");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<MeResponse>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    Ok(Json(MeResponse {
        id: caller.id(),
        username: caller.user.username.clone(),
        is_staff: caller.user.is_staff,
        groups: caller.groups.iter().map(|group| group.as_str()).collect(),
        role: caller.role.as_str(),
    }))
}
