//! ugin API - HTTP server
//!
//! Post CRUD with a generic listing engine, served on a public route group
//! and a token-protected one, plus signup/signin/refresh/check endpoints.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::Router;
use error::AppError;
use state::AppState;
use std::any::Any;
use std::sync::Arc;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
}

/// Turn a handler panic into the usual 500 error body
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("Handler panicked: {detail}")).into_response()
}

/// Build the application router with its middleware stack
pub fn create_router(state: Arc<AppState>) -> Router {
    with_middleware(routes::api_routes(state.clone()), state)
}

fn with_middleware(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    // One semaphore shared by every route
    let limit = GlobalConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests);

    routes
        .layer(limit)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_counter,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;
    use ugin_core::config::AppConfig;

    fn state_with_limit(max_concurrent_requests: usize) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "test-secret-key-that-is-long-enough!!".to_string();
        config.server.max_concurrent_requests = max_concurrent_requests;
        Arc::new(AppState::in_memory(config))
    }

    fn state() -> Arc<AppState> {
        state_with_limit(200)
    }

    async fn explode() -> &'static str {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn test_panicking_handler_yields_json_500() {
        let state = state();
        let app = with_middleware(
            Router::new().route("/explode", get(explode)),
            state.clone(),
        );

        let response = app
            .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!json.to_string().contains("blew up"));
    }

    #[tokio::test]
    async fn test_server_keeps_serving_after_panic() {
        let state = state();
        let app = with_middleware(
            Router::new()
                .route("/explode", get(explode))
                .route("/ok", get(|| async { "ok" })),
            state.clone(),
        );

        let panicked = app
            .clone()
            .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(panicked.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let ok = app
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(state.get_request_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_shared_across_routes() {
        let release = Arc::new(tokio::sync::Notify::new());
        let waiting = release.clone();
        let app = with_middleware(
            Router::new()
                .route(
                    "/slow",
                    get(move || {
                        let waiting = waiting.clone();
                        async move {
                            waiting.notified().await;
                            "slow"
                        }
                    }),
                )
                .route("/fast", get(|| async { "fast" })),
            state_with_limit(1),
        );

        let slow = tokio::spawn(
            app.clone()
                .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap()),
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let fast = app.oneshot(Request::builder().uri("/fast").body(Body::empty()).unwrap());
        tokio::pin!(fast);
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(100), &mut fast).await;
        assert!(blocked.is_err(), "second request ran past the limit");

        release.notify_one();
        assert_eq!(slow.await.unwrap().unwrap().status(), StatusCode::OK);
        assert_eq!(fast.await.unwrap().status(), StatusCode::OK);
    }
}
