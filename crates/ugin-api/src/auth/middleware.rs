//! Request identity middleware
//!
//! Post handlers read an [`Identity`] from request extensions. Which middleware
//! puts it there decides whether a route group is public or gated:
//! [`anonymous_identity`] for the public group, [`auth_middleware`] for the
//! token-protected one. [`admin_basic_auth`] guards the admin dashboard.

use super::jwt::{unix_now, TokenError, TokenKind};
use crate::audit::{audit_log, AuditEvent, ClientContext};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Who is making a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    /// Account identifier taken from a validated access token
    Account(String),
}

impl Identity {
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Account(identifier) => Some(identifier.as_str()),
        }
    }
}

/// Authenticated admin, set by [`admin_basic_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub String);

/// Authorization gate errors
///
/// Every variant renders the same 401 body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(reason = %self, "Request rejected by authorization gate");
        let mut response = (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized())).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Credentials following `scheme` in an `Authorization` value
///
/// The scheme name matches case-insensitively.
fn scheme_credentials<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (name, credentials) = value.trim_start().split_once(' ')?;
    name.eq_ignore_ascii_case(scheme)
        .then(|| credentials.trim())
        .filter(|credentials| !credentials.is_empty())
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    scheme_credentials(value, "Bearer").ok_or(AuthError::InvalidAuthHeader)
}

/// Attach [`Identity::Anonymous`] without checking anything
pub async fn anonymous_identity(mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(Identity::Anonymous);
    next.run(request).await
}

/// Require a valid access token
///
/// Rejected requests never reach the handler. On success the token's subject
/// is attached as [`Identity::Account`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?;

    let claims = match state.tokens.validate_kind(token, TokenKind::Access, unix_now()) {
        Ok(claims) => claims,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                client: ClientContext::from_headers(request.headers()),
            });
            return Err(AuthError::InvalidToken(e));
        }
    };

    tracing::debug!(identifier = %claims.sub, "Access token accepted");
    request.extensions_mut().insert(Identity::Account(claims.sub));

    Ok(next.run(request).await)
}

/// Decode `Authorization: Basic <base64(user:pass)>`
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = scheme_credentials(value, "Basic")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn digest_eq(a: &str, b: &str) -> bool {
    Sha256::digest(a.as_bytes()) == Sha256::digest(b.as_bytes())
}

fn basic_challenge() -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized())).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"ugin admin\""),
    );
    response
}

/// HTTP Basic auth against the configured admin accounts
///
/// With no admin accounts configured every request is refused.
pub async fn admin_basic_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let credentials = basic_credentials(request.headers());

    let admin = credentials.as_ref().and_then(|(username, password)| {
        state
            .config
            .admin
            .accounts
            .iter()
            .find(|account| {
                digest_eq(&account.username, username) && digest_eq(&account.password, password)
            })
            .map(|account| account.username.clone())
    });

    match admin {
        Some(username) => {
            request.extensions_mut().insert(AdminUser(username));
            next.run(request).await
        }
        None => {
            audit_log(&AuditEvent::AccessDenied {
                resource: request.uri().path().to_string(),
                principal: credentials.map(|(username, _)| username),
                client: ClientContext::from_headers(request.headers()),
            });
            basic_challenge()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Token abc")),
            Err(AuthError::InvalidAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Bearer ")),
            Err(AuthError::InvalidAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Bearerabc")),
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[test]
    fn test_auth_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers_with("bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers_with("BEARER abc.def")).unwrap(), "abc.def");
        assert_eq!(
            basic_credentials(&headers_with("basic YWRtaW46czNjcmV0")),
            Some(("admin".to_string(), "s3cret".to_string()))
        );
    }

    #[test]
    fn test_basic_credentials() {
        // "admin:s3cret"
        let headers = headers_with("Basic YWRtaW46czNjcmV0");
        assert_eq!(
            basic_credentials(&headers),
            Some(("admin".to_string(), "s3cret".to_string()))
        );
        assert_eq!(basic_credentials(&headers_with("Basic !!!")), None);
        assert_eq!(basic_credentials(&headers_with("Bearer YWRtaW46czNjcmV0")), None);
    }

    #[test]
    fn test_identity_accessor() {
        assert_eq!(Identity::Anonymous.identifier(), None);
        assert_eq!(Identity::Account("alice".into()).identifier(), Some("alice"));
    }

    #[tokio::test]
    async fn test_gate_errors_share_body() {
        let missing = AuthError::MissingAuthHeader.into_response();
        let invalid = AuthError::InvalidToken(TokenError::Invalid).into_response();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);

        let a = axum::body::to_bytes(missing.into_body(), usize::MAX).await.unwrap();
        let b = axum::body::to_bytes(invalid.into_body(), usize::MAX).await.unwrap();
        assert_eq!(a, b);
    }
}
