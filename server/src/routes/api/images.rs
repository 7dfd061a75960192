use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use color_eyre::eyre::eyre;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{reject, require_id, ApiJson, ImageIdQuery};
use crate::{
    auth::{ApiUser, OptionalUser},
    cookies::CookieJar,
    credits::{can_generate, GuestUsage, LimitStatus, Requester},
    errors::{ApiResult, JsonError},
    generation::{
        service::{self, Generated},
        GenerateImageInput,
    },
    images::{validate_title, Image},
    migration,
    pagination::{PageParams, PaginationMeta},
    state::AppState,
};

/// Who is calling, with guests' usage read from their cookie
pub(crate) fn requester(user: OptionalUser, cookies: &CookieJar) -> Requester {
    match user.user {
        Some(user) => Requester::User(user),
        None => Requester::Guest(GuestUsage::from_cookies(cookies, Utc::now())),
    }
}

pub async fn generate(
    State(state): State<AppState>,
    user: OptionalUser,
    cookies: CookieJar,
    ApiJson(input): ApiJson<GenerateImageInput>,
) -> ApiResult<Json<Value>> {
    let requester = requester(user, &cookies);

    let generated = match service::generate(&state, requester, input).await {
        Ok(generated) => generated,
        Err(err) => {
            let json_error = err.to_json_error();
            return reject(json_error, err);
        }
    };

    let body = match generated {
        Generated::Saved { image, limit } => json!({
            "success": true,
            "image": image,
            "limitStatus": limit,
            "isAuthenticated": true,
        }),
        Generated::Local {
            image,
            usage,
            limit,
        } => {
            cookies.add(usage.to_cookie()?);
            json!({
                "success": true,
                "image": image,
                "limitStatus": limit,
                "isAuthenticated": false,
            })
        }
    };

    Ok(Json(body))
}

pub async fn limit(
    State(state): State<AppState>,
    user: OptionalUser,
    cookies: CookieJar,
) -> Json<LimitStatus> {
    Json(can_generate(&requester(user, &cookies), &state.limits))
}

pub async fn history(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let pagination = params.resolve();
    let (images, total) = Image::history(&state.db, user.id, pagination).await?;

    Ok(Json(json!({
        "images": images,
        "pagination": PaginationMeta::new(pagination, total),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishInput {
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn publish(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    ApiJson(input): ApiJson<PublishInput>,
) -> ApiResult<Json<Value>> {
    let image_id = require_id("imageId", input.image_id.as_deref())?;
    let title = match validate_title(input.title) {
        Ok(title) => title,
        Err(issues) => return JsonError::invalid(issues).fail(),
    };

    let Some(image) = Image::publish(&state.db, image_id, user.id, title.as_deref()).await? else {
        return JsonError::not_found("Image not found or you don't have permission").fail();
    };

    Ok(Json(json!({ "success": true, "image": image })))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Query(query): Query<ImageIdQuery>,
) -> ApiResult<Json<Value>> {
    let image_id = require_id("imageId", query.image_id.as_deref())?;

    let Some(image) = Image::get_owned(&state.db, image_id, user.id).await? else {
        return JsonError::not_found("Image not found or you don't have permission").fail();
    };

    if let Err(err) = state.storage.delete(&image.storage_key).await {
        return reject(
            JsonError::new(StatusCode::BAD_GATEWAY, "Failed to delete image from storage"),
            err,
        );
    }

    if !Image::delete(&state.db, image.id, user.id).await? {
        return reject(
            JsonError::not_found("Image not found or you don't have permission"),
            eyre!("Image {} vanished during delete", image.id),
        );
    }

    info!(image_id = %image.id, user_id = %user.id, "Image deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Image deleted successfully",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateLocalInput {
    #[serde(default)]
    pub local_images: Option<Vec<Value>>,
}

pub async fn migrate_local(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    ApiJson(input): ApiJson<MigrateLocalInput>,
) -> ApiResult<Json<Value>> {
    let Some(items) = input.local_images else {
        return JsonError::bad_request("Invalid request: localImages must be an array").fail();
    };

    let results =
        migration::migrate_local(&state.db, &state.storage, &state.claims, user.id, items).await;

    Ok(Json(json!({
        "success": true,
        "message": "Local images migration completed",
        "results": results,
    })))
}
