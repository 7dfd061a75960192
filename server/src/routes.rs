use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;

use crate::state::AppState;

pub mod api;
pub mod auth;
pub mod billing;
pub mod pages;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        // Pages
        .route("/", get(pages::home))
        .route("/generate", get(pages::generate_page).post(pages::generate_submit))
        .route("/history", get(pages::history_page))
        .route("/history/publish", post(pages::history_publish))
        .route("/feed", get(pages::feed_page))
        .route("/pricing", get(billing::pricing_page))
        // Sign in
        .route("/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        // Billing
        .route("/billing", get(billing::billing_page))
        .route("/billing/checkout", post(billing::checkout))
        .route("/billing/success", get(billing::success_page))
        .route("/api/billing/webhook", post(billing::webhook))
        // JSON API
        .route("/api/images/generate", post(api::images::generate))
        .route("/api/images/limit", get(api::images::limit))
        .route("/api/images/history", get(api::images::history))
        .route("/api/images/publish", post(api::images::publish))
        .route("/api/images/delete", delete(api::images::delete))
        .route("/api/images/migrate-local", post(api::images::migrate_local))
        .route("/api/feeds", get(api::feeds::feed))
        .route(
            "/api/bookmarks",
            get(api::bookmarks::list)
                .post(api::bookmarks::create)
                .delete(api::bookmarks::remove),
        )
        .route(
            "/api/collections",
            get(api::collections::list)
                .post(api::collections::create)
                .put(api::collections::update),
        )
        .route("/api/collections/delete", delete(api::collections::delete))
        .route(
            "/api/collections/:id/images",
            get(api::collections::images)
                .post(api::collections::add_image)
                .delete(api::collections::remove_image),
        )
        .route(
            "/static/*path",
            get(crate::static_assets::serve_static_file),
        )
        .fallback(pages::not_found)
        .layer(CookieManagerLayer::new())
        .with_state(app_state)
}
