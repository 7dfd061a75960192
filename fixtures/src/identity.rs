//! An OAuth 2 authorization code provider that approves every sign in.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::bearer;

#[derive(Clone)]
pub struct IdentityFixture {
    profile: Arc<Mutex<Value>>,
    codes: Arc<Mutex<HashMap<String, String>>>,
    tokens: Arc<Mutex<HashSet<String>>>,
}

impl Default for IdentityFixture {
    fn default() -> Self {
        Self::new(json!({
            "sub": "fixture-user",
            "email": "fixture@example.com",
            "preferred_username": "fixture",
            "picture": "https://example.com/fixture.png",
        }))
    }
}

impl IdentityFixture {
    /// `profile` is what `/oauth/userinfo` returns
    pub fn new(profile: Value) -> Self {
        Self {
            profile: Arc::new(Mutex::new(profile)),
            codes: Arc::new(Mutex::new(HashMap::new())),
            tokens: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn set_profile(&self, profile: Value) {
        *self.profile.lock().unwrap() = profile;
    }

    /// Issue a code directly, as if the user had approved the redirect
    pub fn issue_code(&self, redirect_uri: &str) -> String {
        let code = Uuid::new_v4().simple().to_string();
        self.codes
            .lock()
            .unwrap()
            .insert(code.clone(), redirect_uri.to_string());
        code
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/oauth/authorize", get(authorize))
            .route("/oauth/token", post(token))
            .route("/oauth/userinfo", get(userinfo))
            .with_state(self.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    response_type: Option<String>,
    client_id: Option<String>,
    redirect_uri: String,
    state: Option<String>,
}

async fn authorize(
    State(fixture): State<IdentityFixture>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    if query.response_type.as_deref() != Some("code") || query.client_id.is_none() {
        return (StatusCode::BAD_REQUEST, "unsupported_response_type").into_response();
    }

    let code = fixture.issue_code(&query.redirect_uri);
    let mut params = vec![("code", code)];
    if let Some(state) = query.state {
        params.push(("state", state));
    }

    let separator = if query.redirect_uri.contains('?') { '&' } else { '?' };
    let encoded = serde_urlencoded::to_string(&params).unwrap_or_default();

    info!(redirect_uri = %query.redirect_uri, "IDENTITY: approving sign in");
    Redirect::to(&format!("{}{separator}{encoded}", query.redirect_uri)).into_response()
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    grant_type: String,
    code: String,
    redirect_uri: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

async fn token(State(fixture): State<IdentityFixture>, Form(form): Form<TokenForm>) -> Response {
    let invalid = |error: &str| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
    };

    if form.grant_type != "authorization_code" {
        return invalid("unsupported_grant_type");
    }
    if form.client_id.is_none() || form.client_secret.is_none() {
        return invalid("invalid_client");
    }

    let issued_for = fixture.codes.lock().unwrap().remove(&form.code);
    if issued_for.as_deref() != Some(form.redirect_uri.as_str()) {
        return invalid("invalid_grant");
    }

    let access_token = Uuid::new_v4().simple().to_string();
    fixture.tokens.lock().unwrap().insert(access_token.clone());

    Json(json!({
        "access_token": access_token,
        "refresh_token": Uuid::new_v4().simple().to_string(),
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

async fn userinfo(State(fixture): State<IdentityFixture>, headers: HeaderMap) -> Response {
    let known = bearer(&headers).is_some_and(|token| fixture.tokens.lock().unwrap().contains(&token));
    if !known {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(fixture.profile.lock().unwrap().clone()).into_response()
}
