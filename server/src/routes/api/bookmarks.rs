use axum::{
    extract::{Query, State},
    response::Json,
};
use serde_json::{json, Value};

use super::{reject, require_id, ApiJson, ImageIdBody, ImageIdQuery};
use crate::{
    auth::ApiUser,
    bookmarks::{Bookmark, BookmarkError},
    errors::{ApiResult, JsonError},
    pagination::{PageParams, PaginationMeta},
    state::AppState,
};

fn bookmark_error<T>(err: BookmarkError) -> ApiResult<T> {
    let json_error = match &err {
        BookmarkError::ImageNotFound => JsonError::not_found("Image not found"),
        BookmarkError::AlreadyBookmarked => JsonError::conflict("Image already bookmarked"),
        BookmarkError::NotBookmarked => JsonError::not_found("Bookmark not found"),
        BookmarkError::Database(_) => JsonError::internal("Failed to update bookmarks"),
    };
    reject(json_error, err)
}

pub async fn list(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pagination = params.resolve();
    let (images, total) = Bookmark::list_for_user(&state.db, user.id, pagination).await?;

    Ok(Json(json!({
        "images": images,
        "pagination": PaginationMeta::new(pagination, total),
    })))
}

pub async fn create(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    ApiJson(body): ApiJson<ImageIdBody>,
) -> ApiResult<Json<Value>> {
    let image_id = require_id("imageId", body.image_id.as_deref())?;

    match Bookmark::create(&state.db, user.id, image_id).await {
        Ok(bookmark) => Ok(Json(json!({ "success": true, "bookmark": bookmark }))),
        Err(err) => bookmark_error(err),
    }
}

pub async fn remove(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Query(query): Query<ImageIdQuery>,
) -> ApiResult<Json<Value>> {
    let image_id = require_id("imageId", query.image_id.as_deref())?;

    match Bookmark::remove(&state.db, user.id, image_id).await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "Bookmark removed successfully",
        }))),
        Err(err) => bookmark_error(err),
    }
}
