#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use fixtures::{
    identity::IdentityFixture, image_model::ImageModelFixture, payments::PaymentsFixture, spawn,
    storage::StorageFixture, Spawned,
};
use imagic::{
    auth::SESSION_COOKIE_NAME,
    billing::{payments::PaymentsClient, plans::PlanCatalog, PaymentsConfig},
    cookies::{Cookie, CookieKey},
    credits::UsageLimits,
    generation::model::{ImageModelConfig, OpenAiImageModel},
    identity::{IdentityProvider, IdentityProviderConfig},
    migration::GuestClaims,
    routes::routes,
    state::{build_http_client, EncryptionConfig},
    storage::{ObjectStorage, StorageConfig},
    AppState,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt as _;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const BUCKET: &str = "ai-images";

/// The router wired to in-process fixtures
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub image_model: ImageModelFixture,
    pub storage: StorageFixture,
    pub payments: PaymentsFixture,
    pub identity_url: String,
    _servers: Vec<Spawned>,
}

/// A lazy pool that never connects, for routes that stay off Postgres
pub async fn test_app() -> TestApp {
    let db = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/imagic_test")
        .unwrap();
    test_app_with_pool(db).await
}

pub async fn test_app_with_pool(db: PgPool) -> TestApp {
    let image_model = ImageModelFixture::new();
    let storage = StorageFixture::new();
    let payments = PaymentsFixture::new(WEBHOOK_SECRET);
    let identity = IdentityFixture::default();

    let model_server = spawn(image_model.router()).await.unwrap();
    let storage_server = spawn(storage.router()).await.unwrap();
    let payments_server = spawn(payments.router()).await.unwrap();
    let identity_server = spawn(identity.router()).await.unwrap();
    payments.set_public_url(&payments_server.base_url);

    let http = build_http_client().unwrap();
    let cookie_key = CookieKey::from_env_or_generate().unwrap();

    let state = AppState {
        db,
        claims: GuestClaims::from_cookie_key(&cookie_key),
        cookie_key,
        domain: "localhost:3000".to_string(),
        protocol: "http".to_string(),
        http: http.clone(),
        encryption: EncryptionConfig::generate(),
        image_model: Arc::new(OpenAiImageModel::new(
            http.clone(),
            ImageModelConfig {
                base_url: model_server.base_url.clone(),
                api_key: "sk-test".to_string(),
                model: "dall-e-2".to_string(),
            },
        )),
        storage: ObjectStorage::new(
            http.clone(),
            StorageConfig {
                base_url: storage_server.base_url.clone(),
                service_key: "service-key".to_string(),
                bucket: BUCKET.to_string(),
            },
        ),
        payments: PaymentsClient::new(
            http.clone(),
            PaymentsConfig {
                base_url: payments_server.base_url.clone(),
                secret_key: "sk_test".to_string(),
                webhook_secret: WEBHOOK_SECRET.to_string(),
            },
        ),
        identity: IdentityProvider::new(
            http,
            IdentityProviderConfig {
                base_url: identity_server.base_url.clone(),
                client_id: "imagic".to_string(),
                client_secret: "secret".to_string(),
            },
        ),
        limits: UsageLimits {
            guest_limit: 2,
            signup_credits: 5,
        },
        plans: PlanCatalog::new(
            Some("price_starter".to_string()),
            Some("price_creator".to_string()),
            None,
            Some("price_unlimited".to_string()),
        ),
    };

    TestApp {
        router: routes(state.clone()),
        state,
        image_model,
        storage,
        payments,
        identity_url: identity_server.base_url.clone(),
        _servers: vec![model_server, storage_server, payments_server, identity_server],
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// `name=value` for a cookie the response sets, ready to send back
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

/// A `Cookie` header value carrying the private session cookie for `session_id`
pub fn session_cookie(state: &AppState, session_id: Uuid) -> String {
    let mut jar = tower_cookies::cookie::CookieJar::new();
    jar.private_mut(&state.cookie_key)
        .add(Cookie::new(SESSION_COOKIE_NAME, session_id.to_string()));
    let cookie = jar.get(SESSION_COOKIE_NAME).unwrap();
    format!("{}={}", cookie.name(), cookie.value())
}
