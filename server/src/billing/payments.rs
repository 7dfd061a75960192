//! Minimal client for a Stripe compatible payments API.
//!
//! Requests are form encoded with bracketed keys (`metadata[user_id]`),
//! responses are JSON.

use std::collections::HashMap;

use axum::http::StatusCode;
use serde::Deserialize;
use tracing::{error, info};

use super::PaymentsConfig;

#[derive(Debug, thiserror::Error)]
pub enum PaymentsError {
    #[error("Payments API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to reach the payments API")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// `payment` or `subscription`
    pub mode: String,
    /// `open`, `complete` or `expired`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    /// Unix seconds
    pub current_period_end: i64,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

impl Subscription {
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Parameters for a new checkout session
#[derive(Debug, Clone)]
pub struct NewCheckout<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub mode: &'a str,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(&'a str, String)>,
}

impl NewCheckout<'_> {
    fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("customer".to_string(), self.customer_id.to_string()),
            ("mode".to_string(), self.mode.to_string()),
            ("line_items[0][price]".to_string(), self.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        form
    }
}

#[derive(Clone)]
pub struct PaymentsClient {
    http: reqwest::Client,
    config: PaymentsConfig,
}

impl PaymentsClient {
    pub fn new(http: reqwest::Client, config: PaymentsConfig) -> Self {
        Self { http, config }
    }

    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, PaymentsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.to_string());
        error!(%status, %message, "Payments API request failed");

        Err(PaymentsError::Api {
            status: status.as_u16(),
            message,
        })
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn create_customer(
        &self,
        email: Option<&str>,
        user_id: &str,
    ) -> Result<Customer, PaymentsError> {
        let mut form = vec![("metadata[user_id]".to_string(), user_id.to_string())];
        if let Some(email) = email {
            form.push(("email".to_string(), email.to_string()));
        }

        let response = self
            .http
            .post(self.url("/v1/customers"))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;

        let customer: Customer = Self::parse(response).await?;
        info!(customer_id = %customer.id, "Created payments customer");

        Ok(customer)
    }

    #[tracing::instrument(skip(self, checkout), fields(mode = checkout.mode), err)]
    pub async fn create_checkout_session(
        &self,
        checkout: &NewCheckout<'_>,
    ) -> Result<CheckoutSession, PaymentsError> {
        let response = self
            .http
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(&self.config.secret_key)
            .form(&checkout.form())
            .send()
            .await?;

        Self::parse(response).await
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentsError> {
        let response = self
            .http
            .get(self.url(&format!(
                "/v1/checkout/sessions/{}",
                urlencoding::encode(session_id)
            )))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        Self::parse(response).await
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentsError> {
        let response = self
            .http
            .get(self.url(&format!(
                "/v1/subscriptions/{}",
                urlencoding::encode(subscription_id)
            )))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        Self::parse(response).await
    }
}

impl PaymentsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PaymentsError::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}
