use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

/// A one off credit purchase, one row per completed checkout session
#[derive(Debug, Clone, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    /// Cents
    pub amount: i32,
    pub credits: i32,
    pub status: String,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase<'a> {
    pub user_id: Uuid,
    pub checkout_session_id: &'a str,
    pub payment_intent_id: Option<&'a str>,
    pub amount: i32,
    pub credits: i32,
}

impl Purchase {
    /// Record a completed purchase; `None` when the session was already recorded
    pub async fn record(
        conn: &mut PgConnection,
        new: &NewPurchase<'_>,
    ) -> crate::Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (user_id, checkout_session_id, payment_intent_id, amount, credits, status)
            VALUES ($1, $2, $3, $4, $5, 'completed')
            ON CONFLICT (checkout_session_id) DO NOTHING
            RETURNING id, user_id, checkout_session_id, payment_intent_id, amount, credits, status, created_at_utc
            "#,
        )
        .bind(new.user_id)
        .bind(new.checkout_session_id)
        .bind(new.payment_intent_id)
        .bind(new.amount)
        .bind(new.credits)
        .fetch_optional(conn)
        .await?;

        if let Some(purchase) = &purchase {
            info!(purchase_id = %purchase.id, user_id = %purchase.user_id, credits = purchase.credits, "Purchase recorded");
        }

        Ok(purchase)
    }

    /// Newest first
    pub async fn history(pool: &PgPool, user_id: Uuid) -> crate::Result<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, user_id, checkout_session_id, payment_intent_id, amount, credits, status, created_at_utc
            FROM purchases
            WHERE user_id = $1
            ORDER BY created_at_utc DESC
            LIMIT 50
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(purchases)
    }

    pub fn display_amount(&self) -> String {
        format!("${}.{:02}", self.amount / 100, self.amount % 100)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_subscription_id: String,
    pub provider_price_id: String,
    pub status: String,
    pub current_period_end: DateTime<Utc>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, provider_subscription_id, provider_price_id, \
     status, current_period_end, created_at_utc, updated_at_utc";

impl SubscriptionRecord {
    /// Record a new subscription; `None` when it was already recorded
    pub async fn record(
        conn: &mut PgConnection,
        user_id: Uuid,
        provider_subscription_id: &str,
        provider_price_id: &str,
        status: &str,
        current_period_end: DateTime<Utc>,
    ) -> crate::Result<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            r#"
            INSERT INTO subscriptions (user_id, provider_subscription_id, provider_price_id, status, current_period_end)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider_subscription_id) DO NOTHING
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(provider_subscription_id)
        .bind(provider_price_id)
        .bind(status)
        .bind(current_period_end)
        .fetch_optional(conn)
        .await?;

        if let Some(record) = &record {
            info!(subscription = %record.provider_subscription_id, user_id = %record.user_id, "Subscription recorded");
        }

        Ok(record)
    }

    /// Update status and, when known, the period end. Returns the updated row.
    pub async fn update_status(
        conn: &mut PgConnection,
        provider_subscription_id: &str,
        status: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> crate::Result<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2,
                current_period_end = COALESCE($3, current_period_end),
                updated_at_utc = NOW()
            WHERE provider_subscription_id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(provider_subscription_id)
        .bind(status)
        .bind(current_period_end)
        .fetch_optional(conn)
        .await?;

        Ok(record)
    }

    /// The user's current active or trialing subscription, if any
    pub async fn active_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> crate::Result<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1 AND status IN ('active', 'trialing')
            ORDER BY created_at_utc DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }
}
