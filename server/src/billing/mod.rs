//! Credit packs and the unlimited subscription.
//!
//! Checkout happens on the provider's hosted page. Credits are granted by
//! [`fulfil_checkout`], reached from both the webhook and the success page;
//! whichever arrives second finds the purchase already recorded.

use chrono::{DateTime, TimeZone as _, Utc};
use color_eyre::eyre::{eyre, WrapErr as _};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::user::User;

pub mod db;
pub mod payments;
pub mod plans;
pub mod webhook;

use db::{NewPurchase, Purchase, SubscriptionRecord};
use payments::{CheckoutSession, NewCheckout};
use plans::{credits_for_amount, PlanId, UNLIMITED_CREDITS};

const DEFAULT_PAYMENTS_URL: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
}

impl PaymentsConfig {
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self {
            base_url: std::env::var("PAYMENTS_URL")
                .unwrap_or_else(|_| DEFAULT_PAYMENTS_URL.to_string()),
            secret_key: std::env::var("PAYMENTS_SECRET_KEY")
                .wrap_err("PAYMENTS_SECRET_KEY must be set")?,
            webhook_secret: std::env::var("PAYMENTS_WEBHOOK_SECRET")
                .wrap_err("PAYMENTS_WEBHOOK_SECRET must be set")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fulfilment {
    Fulfilled { user_id: Uuid, credits: i32 },
    AlreadyFulfilled,
    /// Not complete yet, or nothing we can attribute to a user
    Ignored,
}

/// Create a checkout session for `plan`, returning the provider's hosted URL
#[tracing::instrument(skip(state, user), fields(user_id = %user.id, plan = plan.slug()), err)]
pub async fn start_checkout(
    state: &AppState,
    user: &mut User,
    plan: PlanId,
) -> crate::Result<String> {
    let plan = state
        .plans
        .get(plan)
        .ok_or_else(|| eyre!("Unknown plan"))?;
    let price_id = plan
        .price_id
        .as_deref()
        .ok_or_else(|| eyre!("Plan {} has no price configured", plan.name))?;

    let customer_id = match &user.payment_customer_id {
        Some(id) => id.clone(),
        None => {
            let customer = state
                .payments
                .create_customer(user.email.as_deref(), &user.id.to_string())
                .await?;
            user.set_payment_customer_id(&state.db, &customer.id).await?;
            customer.id
        }
    };

    let base = state.base_url();
    let checkout = NewCheckout {
        customer_id: &customer_id,
        price_id,
        mode: plan.checkout_mode(),
        success_url: format!("{base}/billing/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{base}/pricing"),
        metadata: vec![
            ("user_id", user.id.to_string()),
            ("plan", plan.id.slug().to_string()),
        ],
    };

    let session = state.payments.create_checkout_session(&checkout).await?;
    info!(session_id = %session.id, "Checkout session created");

    session
        .url
        .ok_or_else(|| eyre!("Checkout session {} has no url", session.id))
}

async fn user_for_session(
    state: &AppState,
    session: &CheckoutSession,
) -> crate::Result<Option<User>> {
    if let Some(user_id) = session
        .metadata
        .get("user_id")
        .and_then(|id| Uuid::parse_str(id).ok())
    {
        if let Some(user) = User::get_by_id(&state.db, user_id).await? {
            return Ok(Some(user));
        }
    }

    match &session.customer {
        Some(customer) => {
            let mut conn = state.db.acquire().await?;
            User::get_by_payment_customer_id(&mut conn, customer).await
        }
        None => Ok(None),
    }
}

/// Credits a completed payment-mode session is worth
pub fn credits_for_session(state: &AppState, session: &CheckoutSession) -> i32 {
    session
        .metadata
        .get("plan")
        .and_then(|slug| PlanId::parse(slug))
        .and_then(|id| state.plans.get(id))
        .map(|plan| plan.credits)
        .unwrap_or_else(|| credits_for_amount(session.amount_total.unwrap_or_default()))
}

fn period_end(unix: i64) -> crate::Result<DateTime<Utc>> {
    Utc.timestamp_opt(unix, 0)
        .single()
        .ok_or_else(|| eyre!("Invalid period end {unix}"))
}

/// Grant what a completed checkout paid for. Safe to call more than once.
#[tracing::instrument(skip(state, session), fields(session_id = %session.id, mode = %session.mode), err)]
pub async fn fulfil_checkout(
    state: &AppState,
    session: &CheckoutSession,
) -> crate::Result<Fulfilment> {
    if !session.is_complete() {
        info!("Checkout session not complete, ignoring");
        return Ok(Fulfilment::Ignored);
    }

    let Some(user) = user_for_session(state, session).await? else {
        warn!("No user found for checkout session");
        return Ok(Fulfilment::Ignored);
    };

    if session.mode == "subscription" {
        return fulfil_subscription(state, session, user.id).await;
    }

    let credits = credits_for_session(state, session);
    if credits == 0 {
        warn!(amount = ?session.amount_total, "Could not determine credits for checkout");
        return Ok(Fulfilment::Ignored);
    }

    let amount = i32::try_from(session.amount_total.unwrap_or_default())
        .wrap_err("Checkout amount out of range")?;

    let mut tx = state.db.begin().await?;

    let recorded = Purchase::record(
        &mut tx,
        &NewPurchase {
            user_id: user.id,
            checkout_session_id: &session.id,
            payment_intent_id: session.payment_intent.as_deref(),
            amount,
            credits,
        },
    )
    .await?;

    if recorded.is_none() {
        info!("Checkout already fulfilled");
        return Ok(Fulfilment::AlreadyFulfilled);
    }

    User::add_credits(&mut tx, user.id, credits).await?;
    tx.commit().await?;

    Ok(Fulfilment::Fulfilled {
        user_id: user.id,
        credits,
    })
}

async fn fulfil_subscription(
    state: &AppState,
    session: &CheckoutSession,
    user_id: Uuid,
) -> crate::Result<Fulfilment> {
    let subscription_id = session
        .subscription
        .as_deref()
        .ok_or_else(|| eyre!("Subscription checkout without a subscription"))?;

    let subscription = state.payments.retrieve_subscription(subscription_id).await?;
    let price_id = subscription.price_id().unwrap_or_default().to_string();
    let period_end = period_end(subscription.current_period_end)?;

    let mut tx = state.db.begin().await?;

    let recorded = SubscriptionRecord::record(
        &mut tx,
        user_id,
        &subscription.id,
        &price_id,
        &subscription.status,
        period_end,
    )
    .await?;

    if recorded.is_none() {
        info!("Subscription already recorded");
        return Ok(Fulfilment::AlreadyFulfilled);
    }

    User::set_credits(&mut tx, user_id, UNLIMITED_CREDITS).await?;
    tx.commit().await?;

    Ok(Fulfilment::Fulfilled {
        user_id,
        credits: UNLIMITED_CREDITS,
    })
}

/// A renewal: refresh the period and top the balance back up
#[tracing::instrument(skip(state), err)]
pub async fn handle_invoice_paid(state: &AppState, subscription_id: &str) -> crate::Result<()> {
    let subscription = state.payments.retrieve_subscription(subscription_id).await?;
    let period_end = period_end(subscription.current_period_end)?;

    let mut tx = state.db.begin().await?;

    let Some(record) = SubscriptionRecord::update_status(
        &mut tx,
        subscription_id,
        &subscription.status,
        Some(period_end),
    )
    .await?
    else {
        warn!("Invoice paid for an unknown subscription");
        return Ok(());
    };

    User::set_credits(&mut tx, record.user_id, UNLIMITED_CREDITS).await?;
    tx.commit().await?;

    info!(user_id = %record.user_id, "Subscription renewed");
    Ok(())
}

#[tracing::instrument(skip(state), err)]
pub async fn handle_subscription_deleted(
    state: &AppState,
    subscription_id: &str,
) -> crate::Result<()> {
    let mut tx = state.db.begin().await?;

    let Some(record) =
        SubscriptionRecord::update_status(&mut tx, subscription_id, "canceled", None).await?
    else {
        warn!("Deletion for an unknown subscription");
        return Ok(());
    };

    User::set_credits(&mut tx, record.user_id, 0).await?;
    tx.commit().await?;

    info!(user_id = %record.user_id, "Subscription canceled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_end_converts_unix_seconds() {
        let end = period_end(1_700_000_000).unwrap();
        assert_eq!(end.timestamp(), 1_700_000_000);
    }
}
