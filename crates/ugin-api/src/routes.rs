//! API route definitions

use crate::auth::middleware::{admin_basic_auth, anonymous_identity, auth_middleware};
use crate::handlers::{admin, auth, health, posts};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// How a post route group resolves the caller's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Everyone is [`Identity::Anonymous`](crate::auth::middleware::Identity)
    Anonymous,
    /// A valid access token is required
    AccessToken,
}

/// Post routes mounted at `prefix`, guarded by `strategy`
///
/// Both `{prefix}` and `{prefix}/` are registered for the collection.
pub fn post_routes(
    state: Arc<AppState>,
    prefix: &str,
    strategy: IdentityStrategy,
) -> Router<Arc<AppState>> {
    let collection = get(posts::list_posts).post(posts::create_post);
    let item = get(posts::get_post)
        .put(posts::update_post)
        .delete(posts::delete_post);

    let routes = Router::new()
        .route(prefix, collection.clone())
        .route(&format!("{prefix}/"), collection)
        .route(&format!("{prefix}/:id"), item);

    match strategy {
        IdentityStrategy::Anonymous => routes.route_layer(middleware::from_fn(anonymous_identity)),
        IdentityStrategy::AccessToken => {
            routes.route_layer(middleware::from_fn_with_state(state, auth_middleware))
        }
    }
}

/// Signup, signin, refresh, and token check
pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/signin", post(auth::signin_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/check", post(auth::check_handler))
}

/// Admin dashboard behind HTTP Basic auth
pub fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route_layer(middleware::from_fn_with_state(state, admin_basic_auth))
}

/// Liveness and readiness probes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}

/// All routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(post_routes(state.clone(), "/posts", IdentityStrategy::Anonymous))
        .merge(post_routes(state.clone(), "/postsjwt", IdentityStrategy::AccessToken))
        .merge(auth_routes())
        .merge(admin_routes(state))
        .merge(health_routes())
}
