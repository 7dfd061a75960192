mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_json, body_text, get, json_request, set_cookie, test_app, BUCKET};
use imagic::credits::GUEST_USAGE_COOKIE_NAME;
use serde_json::json;

fn generate_body() -> serde_json::Value {
    json!({
        "prompt": "a lighthouse on a cliff at dusk",
        "orientation": "square 1024x1024",
        "colorScheme": "Warm",
        "seed": 42,
    })
}

#[tokio::test]
async fn test_guest_limit_starts_full() {
    let app = test_app().await;

    let response = app.send(get("/api/images/limit")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({ "allowed": true, "isGuest": true, "remaining": 2, "usage": 0, "max": 2 })
    );
}

#[tokio::test]
async fn test_guest_generations_are_counted_and_capped() {
    let app = test_app().await;

    let first = app
        .send(json_request("POST", "/api/images/generate", &generate_body(), None))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = set_cookie(&first, GUEST_USAGE_COOKIE_NAME).unwrap();

    let body = body_json(first).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["isAuthenticated"], false);
    assert_eq!(body["limitStatus"]["remaining"], 1);

    let storage_key = body["image"]["storageKey"].as_str().unwrap();
    assert!(storage_key.starts_with("images/anonymous_"));
    assert!(storage_key.ends_with(".png"));
    assert_eq!(
        app.storage.get(BUCKET, storage_key).unwrap().content_type,
        "image/png"
    );
    assert!(!body["image"]["claim"].as_str().unwrap().is_empty());
    assert_eq!(body["image"]["seed"], 42);

    let sent = app.image_model.requests();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["prompt"]
        .as_str()
        .unwrap()
        .contains("Use a Warm color scheme."));

    let second = app
        .send(json_request(
            "POST",
            "/api/images/generate",
            &generate_body(),
            Some(&cookie),
        ))
        .await;
    assert_eq!(second.status(), StatusCode::OK);
    let cookie = set_cookie(&second, GUEST_USAGE_COOKIE_NAME).unwrap();
    assert_eq!(body_json(second).await["limitStatus"]["remaining"], 0);

    let third = app
        .send(json_request(
            "POST",
            "/api/images/generate",
            &generate_body(),
            Some(&cookie),
        ))
        .await;
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(third).await["error"],
        "Free generations used. Sign up for more!"
    );
    assert_eq!(app.storage.len(), 2);
}

#[tokio::test]
async fn test_invalid_generation_reports_every_field() {
    let app = test_app().await;

    let response = app
        .send(json_request(
            "POST",
            "/api/images/generate",
            &json!({ "prompt": "hi", "orientation": "sideways", "guidanceScale": 11 }),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let paths: Vec<&str> = body["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| issue["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"prompt"));
    assert!(paths.contains(&"orientation"));
    assert!(paths.contains(&"guidanceScale"));
    assert!(app.image_model.requests().is_empty());
}

#[tokio::test]
async fn test_model_failure_stores_nothing() {
    let app = test_app().await;
    app.image_model
        .fail_with(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");

    let response = app
        .send(json_request("POST", "/api/images/generate", &generate_body(), None))
        .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(set_cookie(&response, GUEST_USAGE_COOKIE_NAME).is_none());
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_a_json_400() {
    let app = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/images/generate")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("prompt"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Expected a JSON request body");
}

#[tokio::test]
async fn test_api_routes_require_a_session() {
    let app = test_app().await;

    for uri in [
        "/api/images/history",
        "/api/bookmarks",
        "/api/collections",
    ] {
        let response = app.send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body_json(response).await, json!({ "error": "Unauthorized" }));
    }
}

#[tokio::test]
async fn test_pages_redirect_anonymous_visitors_to_login() {
    let app = test_app().await;

    for uri in ["/history", "/billing"] {
        let response = app.send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }
}

#[tokio::test]
async fn test_login_redirects_to_identity_provider() {
    let app = test_app().await;

    let response = app.send(get("/login")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/oauth/authorize?", app.identity_url)));
    assert!(location.contains("client_id=imagic"));
    assert!(location.contains("state="));
    assert!(set_cookie(&response, "imagic_oauth_state").is_some());
}

#[tokio::test]
async fn test_callback_without_matching_state_fails_closed() {
    let app = test_app().await;

    let response = app
        .send(get("/auth/callback?code=abc&state=forged"))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/?login_error=1");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = test_app().await;
    let (body, _) = app
        .payments
        .signed_event("customer.created", json!({ "id": "cus_1" }));

    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/billing/webhook")
        .body(Body::from(body.clone()))
        .unwrap();
    let response = app.send(unsigned).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing signature header");

    let forged = Request::builder()
        .method("POST")
        .uri("/api/billing/webhook")
        .header("Stripe-Signature", "t=1,v1=deadbeef")
        .body(Body::from(body))
        .unwrap();
    let response = app.send(forged).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_acknowledges_unhandled_events() {
    let app = test_app().await;
    let (body, signature) = app
        .payments
        .signed_event("customer.created", json!({ "id": "cus_1" }));

    let request = Request::builder()
        .method("POST")
        .uri("/api/billing/webhook")
        .header("Stripe-Signature", signature)
        .body(Body::from(body))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "received": true }));
}

#[tokio::test]
async fn test_generate_page_for_guests() {
    let app = test_app().await;

    let response = app.send(get("/generate")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("id=\"local-images\""));
    assert!(html.contains("limit-badge"));
    assert!(html.contains("Sign in"));
}

#[tokio::test]
async fn test_generate_form_keeps_guest_image_in_browser() {
    let app = test_app().await;

    let form = serde_urlencoded::to_string([
        ("prompt", "a lighthouse on a cliff at dusk"),
        ("orientation", "square 1024x1024"),
        ("guidanceScale", "7.5"),
        ("seed", ""),
    ])
    .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, GUEST_USAGE_COOKIE_NAME).is_some());

    let html = body_text(response).await;
    assert!(html.contains("data-local-image"));
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn test_pricing_lists_plans() {
    let app = test_app().await;

    let html = body_text(app.send(get("/pricing")).await).await;
    assert!(html.contains("Starter"));
    assert!(html.contains("Unlimited"));
    assert!(html.contains("Sign in to buy"));
    assert!(html.contains("Unavailable"));
}

#[tokio::test]
async fn test_unknown_routes() {
    let app = test_app().await;

    let response = app.send(get("/api/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "Not found" }));

    let response = app.send(get("/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));
}

#[tokio::test]
async fn test_static_script_is_served() {
    let app = test_app().await;

    let response = app.send(get("/static/imagic.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("imagic_local_images"));
}
