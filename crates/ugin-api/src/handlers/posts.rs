//! Post CRUD and listing handlers
//!
//! One handler set serves both `/posts` and `/postsjwt`; the route group's
//! middleware decides which [`Identity`] reaches the handler.

use crate::auth::middleware::Identity;
use crate::error::AppError;
use crate::state::{with_deadline, AppState};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use ugin_core::{ListingPage, ListingParams, Post, PostDraft};

/// Path ids that are not integers cannot name a post
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::NotFound(format!("post {raw}")))
}

/// List posts with `Sort`, `Order`, `Offset`, `Limit`, and `Search`
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListingPage<Post>>, AppError> {
    let query = state.listing.build(&ListingParams::from_pairs(pairs));
    tracing::debug!(
        identity = ?identity.identifier(),
        sort = query.sort_field(),
        order = %query.sort_order(),
        offset = query.offset(),
        limit = query.limit(),
        "Listing posts"
    );

    let page = with_deadline(state.store_timeout, state.posts.query(&query)).await?;
    Ok(Json(page))
}

/// Get a single post
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    let id = parse_id(&id)?;
    let post = with_deadline(state.store_timeout, state.posts.get(id)).await?;
    Ok(Json(post))
}

/// Create a post; absent fields default to empty strings
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>, AppError> {
    let post = with_deadline(state.store_timeout, state.posts.create(draft)).await?;
    tracing::info!(id = post.id, identity = ?identity.identifier(), "Post created");
    Ok(Json(post))
}

/// Merge the body into an existing post; absent fields keep their values
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>, AppError> {
    let id = parse_id(&id)?;
    let post = with_deadline(state.store_timeout, state.posts.update(id, draft)).await?;
    tracing::info!(id, identity = ?identity.identifier(), "Post updated");
    Ok(Json(post))
}

/// Delete a post, answering `{"id#<id>": "deleted"}`
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&raw_id)?;
    with_deadline(state.store_timeout, state.posts.delete(id)).await?;
    tracing::info!(id, identity = ?identity.identifier(), "Post deleted");

    let mut body = Map::new();
    body.insert(format!("id#{id}"), Value::from("deleted"));
    Ok(Json(Value::Object(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("007").unwrap(), 7);
        assert!(matches!(parse_id("abc"), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id(""), Err(AppError::NotFound(_))));
    }
}
