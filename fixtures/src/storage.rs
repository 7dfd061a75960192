//! Supabase style object storage kept in memory.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::has_bearer;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct StorageFixture {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

fn object_id(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

impl StorageFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&object_id(bucket, key))
            .cloned()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.get(bucket, key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Put an object in place directly, bypassing the API
    pub fn insert(&self, bucket: &str, key: &str, content_type: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            object_id(bucket, key),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/storage/v1/object/public/:bucket/*key", get(download))
            .route(
                "/storage/v1/object/:bucket/*key",
                post(upload).delete(remove),
            )
            .with_state(self.clone())
    }
}

async fn upload(
    State(fixture): State<StorageFixture>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !has_bearer(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" })))
            .into_response();
    }

    let upsert = headers
        .get("x-upsert")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true");
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let id = object_id(&bucket, &key);
    let mut objects = fixture.objects.lock().unwrap();
    if objects.contains_key(&id) && !upsert {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "The resource already exists" })),
        )
            .into_response();
    }

    info!(%id, size = body.len(), "STORAGE: upload");
    objects.insert(
        id.clone(),
        StoredObject {
            content_type,
            bytes: body.to_vec(),
        },
    );

    Json(json!({ "Key": id })).into_response()
}

async fn remove(
    State(fixture): State<StorageFixture>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !has_bearer(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" })))
            .into_response();
    }

    let id = object_id(&bucket, &key);
    match fixture.objects.lock().unwrap().remove(&id) {
        Some(_) => {
            info!(%id, "STORAGE: delete");
            Json(json!({ "message": "Successfully deleted" })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Object not found" })),
        )
            .into_response(),
    }
}

async fn download(
    State(fixture): State<StorageFixture>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match fixture.get(&bucket, &key) {
        Some(object) => (
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
