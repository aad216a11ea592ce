use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::db::RepositoryError;

pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// Per-field validation messages, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(String::from(field))
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// `Ok(value)` when no messages were collected.
    pub fn into_result<T>(self, value: T) -> Result<T, ApiError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden(Option<&'static str>),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn forbidden() -> Self {
        ApiError::Forbidden(Some(PERMISSION_DENIED))
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("Not found.")
    }

    pub fn invalid_pk(field: &str, id: i64) -> Self {
        ApiError::Validation(FieldErrors::single(
            field,
            format!("Invalid pk \"{id}\" - object does not exist."),
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        error!(error = %err, "storage operation failed");
        ApiError::Internal
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!(reason = %rejection.body_text(), "unparsable path parameter");
        ApiError::not_found()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            ApiError::Forbidden(None) => status.into_response(),
            ApiError::Forbidden(Some(detail)) => {
                (status, Json(serde_json::json!({ "error": detail }))).into_response()
            }
            ApiError::Validation(errors) => (status, Json(errors)).into_response(),
            ApiError::Unauthorized => {
                let body = Json(serde_json::json!({ "error": message }));
                let mut response = (status, body).into_response();
                response.headers_mut().insert(
                    WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"little-lemon\""),
                );
                response
            }
            _ => (status, Json(serde_json::json!({ "error": message }))).into_response(),
        }
    }
}
