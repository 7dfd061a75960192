//! OpenAI style `/v1/images/generations`, always answering with the same tiny PNG.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::{api_error, has_bearer};

/// A 1x1 transparent PNG
pub const FIXTURE_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[derive(Clone, Default)]
pub struct ImageModelFixture {
    requests: Arc<Mutex<Vec<Value>>>,
    failure: Arc<Mutex<Option<(StatusCode, String)>>>,
}

impl ImageModelFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request body received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Make every following request fail with `status`
    pub fn fail_with(&self, status: StatusCode, message: &str) {
        *self.failure.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/images/generations", post(generations))
            .with_state(self.clone())
    }
}

async fn generations(
    State(fixture): State<ImageModelFixture>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !has_bearer(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "Missing API key").into_response();
    }

    if let Some((status, message)) = fixture.failure.lock().unwrap().clone() {
        return api_error(status, &message).into_response();
    }

    if body["prompt"].as_str().map_or(true, str::is_empty) {
        return api_error(StatusCode::BAD_REQUEST, "prompt is required").into_response();
    }

    info!(prompt = %body["prompt"], size = %body["size"], "IMAGE MODEL: generating");
    fixture.requests.lock().unwrap().push(body);

    Json(json!({
        "created": 1_700_000_000,
        "data": [{ "b64_json": FIXTURE_PNG_BASE64 }],
    }))
    .into_response()
}
