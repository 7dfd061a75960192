use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{reject, require_id, ApiJson, ImageIdBody, ImageIdQuery};
use crate::{
    auth::ApiUser,
    collections::{Collection, CollectionError, CollectionInput},
    errors::{ApiResult, JsonError},
    pagination::{PageParams, PaginationMeta},
    state::AppState,
};

fn collection_error<T>(err: CollectionError) -> ApiResult<T> {
    let json_error = match &err {
        CollectionError::NotFound => {
            JsonError::not_found("Collection not found or you don't have permission")
        }
        CollectionError::ImageNotFound => JsonError::not_found("Image not found"),
        CollectionError::AlreadyInCollection => {
            JsonError::conflict("Image already in collection")
        }
        CollectionError::NotInCollection => JsonError::not_found("Image not found in collection"),
        CollectionError::Database(_) => JsonError::internal("Failed to update collection"),
    };
    reject(json_error, err)
}

fn validated(input: CollectionInput) -> ApiResult<crate::collections::CollectionFields> {
    input.validate().or_else(|issues| JsonError::invalid(issues).fail())
}

pub async fn list(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
) -> ApiResult<Json<Value>> {
    match Collection::list_for_user(&state.db, user.id).await {
        Ok(collections) => Ok(Json(json!({ "collections": collections }))),
        Err(err) => collection_error(err),
    }
}

pub async fn create(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    ApiJson(input): ApiJson<CollectionInput>,
) -> ApiResult<Json<Value>> {
    let fields = validated(input)?;

    match Collection::create(&state.db, user.id, &fields).await {
        Ok(collection) => Ok(Json(json!({ "success": true, "collection": collection }))),
        Err(err) => collection_error(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionInput {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(flatten)]
    pub fields: CollectionInput,
}

pub async fn update(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    ApiJson(input): ApiJson<UpdateCollectionInput>,
) -> ApiResult<Json<Value>> {
    let collection_id = require_id("collectionId", input.collection_id.as_deref())?;
    let fields = validated(input.fields)?;

    match Collection::update(&state.db, collection_id, user.id, &fields).await {
        Ok(collection) => Ok(Json(json!({ "success": true, "collection": collection }))),
        Err(err) => collection_error(err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionIdQuery {
    pub collection_id: Option<String>,
}

pub async fn delete(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Query(query): Query<CollectionIdQuery>,
) -> ApiResult<Json<Value>> {
    let collection_id = require_id("collectionId", query.collection_id.as_deref())?;

    match Collection::delete(&state.db, collection_id, user.id).await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "Collection deleted successfully",
        }))),
        Err(err) => collection_error(err),
    }
}

pub async fn images(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let collection_id = require_id("id", Some(&id))?;
    let pagination = params.resolve();

    let collection = match Collection::get_owned(&state.db, collection_id, user.id).await {
        Ok(collection) => collection,
        Err(err) => return collection_error(err),
    };

    match Collection::images(&state.db, collection_id, user.id, pagination).await {
        Ok((images, total)) => Ok(Json(json!({
            "collection": collection,
            "images": images,
            "pagination": PaginationMeta::new(pagination, total),
        }))),
        Err(err) => collection_error(err),
    }
}

pub async fn add_image(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ImageIdBody>,
) -> ApiResult<Json<Value>> {
    let collection_id = require_id("id", Some(&id))?;
    let image_id = require_id("imageId", body.image_id.as_deref())?;

    match Collection::add_image(&state.db, collection_id, user.id, image_id).await {
        Ok(entry_id) => Ok(Json(json!({
            "success": true,
            "collectionImage": {
                "id": entry_id,
                "collectionId": collection_id,
                "imageId": image_id,
            },
        }))),
        Err(err) => collection_error(err),
    }
}

pub async fn remove_image(
    State(state): State<AppState>,
    ApiUser { user, .. }: ApiUser,
    Path(id): Path<String>,
    Query(query): Query<ImageIdQuery>,
) -> ApiResult<Json<Value>> {
    let collection_id = require_id("id", Some(&id))?;
    let image_id = require_id("imageId", query.image_id.as_deref())?;

    match Collection::remove_image(&state.db, collection_id, user.id, image_id).await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "Image removed from collection successfully",
        }))),
        Err(err) => collection_error(err),
    }
}
