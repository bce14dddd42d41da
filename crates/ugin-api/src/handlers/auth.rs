//! Authentication API handlers

use crate::audit::ClientContext;
use crate::auth::middleware::{bearer_token, AuthError};
use crate::auth::service::{
    AuthResponse, CheckResponse, RefreshRequest, RefreshResponse, SigninRequest, SignupRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Create an account
///
/// * `201 Created` - account created, body is the public account view
/// * `400 Bad Request` - blank identifier or empty password
/// * `409 Conflict` - identifier already taken
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.auth.signup(request, &client).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Exchange credentials for an access token and a refresh token
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Json(request): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(state.auth.signin(request, &client).await?))
}

/// Exchange a refresh token for a new access token
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    Ok(Json(state.auth.refresh(request, &client).await?))
}

/// Report whose access token is in `Authorization: Bearer`
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    client: ClientContext,
    headers: HeaderMap,
) -> Result<Json<CheckResponse>, AppError> {
    let token = bearer_token(&headers).map_err(|e: AuthError| {
        tracing::debug!(reason = %e, "Token check without bearer token");
        AppError::InvalidToken
    })?;

    Ok(Json(state.auth.check(token, &client)?))
}
