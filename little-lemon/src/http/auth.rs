use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::prelude::*;
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;
use crate::roles::Caller;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Token(String),
}

/// Resolves the caller behind a request.
///
/// `Ok(None)` means no credentials were sent. Credentials that do not check out
/// are rejected even on endpoints that allow anonymous access.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<Caller>, ApiError> {
    let Some(credentials) = extract_credentials(headers)? else {
        return Ok(None);
    };

    let user = match credentials {
        Credentials::Basic { username, password } => {
            if !state.auth.is_authorized(&username, &password) {
                warn!(username = %username, "rejected basic auth credentials");
                return Err(ApiError::Unauthorized);
            }
            state.db.users().get_by_username(&username).await?
        }
        Credentials::Token(token) => match state.tokens.get(&token) {
            Some(user_id) => state.db.users().get(user_id).await?,
            None => None,
        },
    };

    let Some(user) = user else {
        warn!("unauthorized request");
        return Err(ApiError::Unauthorized);
    };

    let groups = state.db.users().groups_of(user.id).await?;
    let caller = Caller::new(user, groups);
    debug!(user_id = caller.id(), role = caller.role.as_str(), "authenticated request");
    Ok(Some(caller))
}

pub async fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    authenticate(state, headers).await?.ok_or(ApiError::Unauthorized)
}

/// Fails with a 403 carrying the standard permission message.
pub fn ensure(allowed: bool, caller: &Caller) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        warn!(
            user_id = caller.id(),
            role = caller.role.as_str(),
            "permission denied"
        );
        Err(ApiError::forbidden())
    }
}

/// `Ok(None)` when no header is sent or the scheme is not one we handle.
/// A Basic or Token header that cannot be parsed is a 401.
pub fn extract_credentials(headers: &HeaderMap) -> Result<Option<Credentials>, ApiError> {
    let Some(raw) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| malformed("authorization header is not valid ASCII"))?;
    let mut parts = raw.split_whitespace();
    let Some(scheme) = parts.next() else {
        return Ok(None);
    };

    let basic = scheme.eq_ignore_ascii_case("basic");
    let token = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    if !basic && !token {
        return Ok(None);
    }

    let (Some(value), None) = (parts.next(), parts.next()) else {
        return Err(malformed("credentials must be a single value"));
    };
    if token {
        return Ok(Some(Credentials::Token(value.to_string())));
    }

    let decoded = BASE64_STANDARD
        .decode(value)
        .map_err(|_| malformed("basic credentials are not valid base64"))?;
    let credentials =
        String::from_utf8(decoded).map_err(|_| malformed("basic credentials are not UTF-8"))?;
    let (username, password) = credentials
        .split_once(':')
        .ok_or_else(|| malformed("basic credentials have no ':' separator"))?;
    Ok(Some(Credentials::Basic {
        username: username.to_string(),
        password: password.to_string(),
    }))
}

fn malformed(reason: &'static str) -> ApiError {
    warn!(reason, "malformed authorization header");
    ApiError::Unauthorized
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, HeaderValue};

    use super::{extract_credentials, Credentials};
    use crate::http::error::ApiError;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn parses_basic_and_token_schemes() {
        assert_eq!(
            extract_credentials(&headers("Basic YWRtaW46c2VjcmV0")).unwrap(),
            Some(Credentials::Basic {
                username: String::from("admin"),
                password: String::from("secret"),
            })
        );
        assert_eq!(
            extract_credentials(&headers("Token abc123")).unwrap(),
            Some(Credentials::Token(String::from("abc123")))
        );
        assert_eq!(
            extract_credentials(&headers("bearer abc123")).unwrap(),
            Some(Credentials::Token(String::from("abc123")))
        );
    }

    #[test]
    fn missing_header_or_foreign_scheme_is_anonymous() {
        assert_eq!(extract_credentials(&HeaderMap::new()).unwrap(), None);
        assert_eq!(extract_credentials(&headers("Digest abc")).unwrap(), None);
        assert_eq!(extract_credentials(&headers("")).unwrap(), None);
    }

    #[test]
    fn unparsable_credentials_are_unauthorized() {
        for value in [
            "Basic",
            "Basic a b",
            "Basic !!!",
            "Basic bm9jb2xvbg==",
            "Token",
            "Token a b",
        ] {
            assert!(
                matches!(extract_credentials(&headers(value)), Err(ApiError::Unauthorized)),
                "{value}"
            );
        }
    }
}
