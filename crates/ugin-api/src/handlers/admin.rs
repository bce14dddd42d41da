//! Admin dashboard, reached only through HTTP Basic auth

use crate::auth::middleware::AdminUser;
use crate::error::AppError;
use crate::state::{with_deadline, AppState};
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use ugin_core::{ListingParams, Post};

/// Dashboard summary
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub admin: String,
    pub store: String,
    pub total_posts: u64,
    pub latest_posts: Vec<Post>,
    pub uptime_seconds: u64,
    pub total_requests: u64,
}

const LATEST_POSTS: &str = "5";

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(AdminUser(admin)): Extension<AdminUser>,
) -> Result<Json<DashboardResponse>, AppError> {
    let query = state
        .listing
        .build(&ListingParams::from_pairs([("limit", LATEST_POSTS)]));
    let page = with_deadline(state.store_timeout, state.posts.query(&query)).await?;

    Ok(Json(DashboardResponse {
        admin,
        store: state.posts.name().to_string(),
        total_posts: page.total,
        latest_posts: page.items,
        uptime_seconds: state.uptime_secs(),
        total_requests: state.get_request_count(),
    }))
}
