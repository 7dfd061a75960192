//! A Stripe shaped payments API: customers, hosted checkout, subscriptions
//! and signed webhook events.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use ring::hmac;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::{api_error, has_bearer};

const THIRTY_DAYS_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct PaymentsFixture {
    public_url: Arc<Mutex<String>>,
    webhook_secret: String,
    prices: Arc<Mutex<HashMap<String, i64>>>,
    customers: Arc<Mutex<HashMap<String, Value>>>,
    sessions: Arc<Mutex<HashMap<String, Value>>>,
    subscriptions: Arc<Mutex<HashMap<String, Value>>>,
    counter: Arc<AtomicU64>,
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Counterpart of the server's webhook verification
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(timestamp.to_string().as_bytes());
    ctx.update(b".");
    ctx.update(payload);
    format!("t={timestamp},v1={}", hex::encode(ctx.sign().as_ref()))
}

impl PaymentsFixture {
    pub fn new(webhook_secret: &str) -> Self {
        Self {
            public_url: Arc::new(Mutex::new(String::new())),
            webhook_secret: webhook_secret.to_string(),
            prices: Arc::new(Mutex::new(HashMap::new())),
            customers: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Where the hosted checkout page lives; set once the fixture has a port
    pub fn set_public_url(&self, url: &str) {
        *self.public_url.lock().unwrap() = url.trim_end_matches('/').to_string();
    }

    /// Register a price in cents
    pub fn add_price(&self, price_id: &str, amount: i64) {
        self.prices
            .lock()
            .unwrap()
            .insert(price_id.to_string(), amount);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_test_{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }

    pub fn session(&self, id: &str) -> Option<Value> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    pub fn subscription(&self, id: &str) -> Option<Value> {
        self.subscriptions.lock().unwrap().get(id).cloned()
    }

    /// Pay for a session as the hosted page would, creating the subscription
    /// for subscription mode sessions
    pub fn complete_session(&self, id: &str) -> Option<Value> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(id)?;

        if session["status"] == "complete" {
            return Some(session.clone());
        }

        session["status"] = json!("complete");
        session["payment_status"] = json!("paid");

        if session["mode"] == "subscription" {
            let subscription_id = self.next_id("sub");
            let subscription = json!({
                "id": subscription_id,
                "object": "subscription",
                "status": "active",
                "customer": session["customer"],
                "current_period_end": unix_now() + THIRTY_DAYS_SECS as i64,
                "items": { "data": [{ "price": { "id": session["price"] } }] },
            });
            self.subscriptions
                .lock()
                .unwrap()
                .insert(subscription_id.clone(), subscription);
            session["subscription"] = json!(subscription_id);
        } else {
            session["payment_intent"] = json!(self.next_id("pi"));
        }

        info!(session_id = %id, "PAYMENTS: checkout completed");
        Some(session.clone())
    }

    /// Mark a subscription canceled, returning it
    pub fn cancel_subscription(&self, id: &str) -> Option<Value> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(id)?;
        subscription["status"] = json!("canceled");
        Some(subscription.clone())
    }

    /// A webhook body for `kind` wrapping `object`, with its signature header
    pub fn signed_event(&self, kind: &str, object: Value) -> (String, String) {
        let body = json!({
            "id": self.next_id("evt"),
            "object": "event",
            "type": kind,
            "data": { "object": object },
        })
        .to_string();

        let header = signature_header(body.as_bytes(), &self.webhook_secret, unix_now());
        (body, header)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/customers", post(create_customer))
            .route("/v1/checkout/sessions", post(create_session))
            .route("/v1/checkout/sessions/:id", get(retrieve_session))
            .route("/v1/subscriptions/:id", get(retrieve_subscription))
            .route("/checkout/:id", get(hosted_checkout))
            .with_state(self.clone())
    }
}

fn unauthorized() -> Response {
    api_error(StatusCode::UNAUTHORIZED, "Invalid API Key provided").into_response()
}

/// Collect `metadata[key]=value` pairs into an object
fn metadata(form: &HashMap<String, String>) -> Value {
    let map: Map<String, Value> = form
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix("metadata[")
                .and_then(|rest| rest.strip_suffix(']'))
                .map(|name| (name.to_string(), json!(value)))
        })
        .collect();
    Value::Object(map)
}

async fn create_customer(
    State(fixture): State<PaymentsFixture>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !has_bearer(&headers) {
        return unauthorized();
    }

    let id = fixture.next_id("cus");
    let customer = json!({
        "id": id,
        "object": "customer",
        "email": form.get("email"),
        "metadata": metadata(&form),
    });
    fixture
        .customers
        .lock()
        .unwrap()
        .insert(id.clone(), customer.clone());

    info!(customer_id = %id, "PAYMENTS: customer created");
    Json(customer).into_response()
}

async fn create_session(
    State(fixture): State<PaymentsFixture>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !has_bearer(&headers) {
        return unauthorized();
    }

    let Some(price) = form.get("line_items[0][price]") else {
        return api_error(StatusCode::BAD_REQUEST, "Missing line_items[0][price]").into_response();
    };
    let Some(amount) = fixture.prices.lock().unwrap().get(price).copied() else {
        return api_error(StatusCode::BAD_REQUEST, &format!("No such price: '{price}'"))
            .into_response();
    };
    let (Some(success_url), Some(cancel_url)) = (form.get("success_url"), form.get("cancel_url"))
    else {
        return api_error(StatusCode::BAD_REQUEST, "Missing success_url or cancel_url")
            .into_response();
    };

    let id = fixture.next_id("cs");
    let url = format!("{}/checkout/{id}", fixture.public_url.lock().unwrap());
    let session = json!({
        "id": id,
        "object": "checkout.session",
        "url": url,
        "mode": form.get("mode").map(String::as_str).unwrap_or("payment"),
        "status": "open",
        "payment_status": "unpaid",
        "customer": form.get("customer"),
        "payment_intent": null,
        "subscription": null,
        "amount_total": amount,
        "price": price,
        "success_url": success_url,
        "cancel_url": cancel_url,
        "metadata": metadata(&form),
    });
    fixture
        .sessions
        .lock()
        .unwrap()
        .insert(id.clone(), session.clone());

    info!(session_id = %id, "PAYMENTS: checkout session created");
    Json(session).into_response()
}

async fn retrieve_session(
    State(fixture): State<PaymentsFixture>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !has_bearer(&headers) {
        return unauthorized();
    }

    match fixture.session(&id) {
        Some(session) => Json(session).into_response(),
        None => api_error(
            StatusCode::NOT_FOUND,
            &format!("No such checkout.session: '{id}'"),
        )
        .into_response(),
    }
}

async fn retrieve_subscription(
    State(fixture): State<PaymentsFixture>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !has_bearer(&headers) {
        return unauthorized();
    }

    match fixture.subscription(&id) {
        Some(subscription) => Json(subscription).into_response(),
        None => api_error(
            StatusCode::NOT_FOUND,
            &format!("No such subscription: '{id}'"),
        )
        .into_response(),
    }
}

/// The hosted payment page: pays immediately and returns to `success_url`
async fn hosted_checkout(
    State(fixture): State<PaymentsFixture>,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = fixture.complete_session(&id) else {
        return (StatusCode::NOT_FOUND, "Unknown checkout session").into_response();
    };

    let success_url = session["success_url"]
        .as_str()
        .unwrap_or("/")
        .replace("{CHECKOUT_SESSION_ID}", &id);

    Redirect::to(&success_url).into_response()
}
