use chrono::{DateTime, Utc};
use color_eyre::eyre::{eyre, WrapErr as _};
use sqlx::{postgres::PgPool, FromRow, PgConnection};
use tracing::{error, info};
use uuid::Uuid;

use crate::encryption;
use crate::identity::{IdentityTokens, UserInfo};

/// Represents a user in the system
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Subject id assigned by the identity provider
    pub external_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    /// Remaining generations
    pub credits: i32,
    /// Customer id at the payment provider, created on first checkout
    pub payment_customer_id: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Represents a session for authenticated users
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    /// Unique session ID (used in cookies)
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, external_id, email, username, avatar_url, credits, \
     payment_customer_id, created_at_utc, updated_at_utc";

impl User {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Anonymous")
    }

    /// Get a user by their ID
    pub async fn get_by_id(pool: &PgPool, user_id: Uuid) -> crate::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> crate::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_payment_customer_id(
        conn: &mut PgConnection,
        customer_id: &str,
    ) -> crate::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE payment_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Create the user on first sign in, or refresh their profile on later ones.
    ///
    /// `signup_credits` only applies to brand new accounts.
    pub async fn upsert_from_identity(
        pool: &PgPool,
        info: &UserInfo,
        signup_credits: i32,
    ) -> crate::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (external_id, email, username, avatar_url, credits)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE
            SET email = EXCLUDED.email,
                username = EXCLUDED.username,
                avatar_url = EXCLUDED.avatar_url,
                updated_at_utc = NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&info.sub)
        .bind(&info.email)
        .bind(info.display_name())
        .bind(&info.picture)
        .bind(signup_credits)
        .fetch_one(pool)
        .await
        .wrap_err("Failed to upsert user from identity")?;

        info!(user_id = %user.id, external_id = %user.external_id, "Upserted user from identity");

        Ok(user)
    }

    pub async fn set_payment_customer_id(
        &mut self,
        pool: &PgPool,
        customer_id: &str,
    ) -> crate::Result<()> {
        sqlx::query(
            "UPDATE users SET payment_customer_id = $1, updated_at_utc = NOW() WHERE id = $2",
        )
        .bind(customer_id)
        .bind(self.id)
        .execute(pool)
        .await
        .map_err(|e| {
            error!("Failed to set payment customer for user {}: {:?}", self.id, e);
            eyre!("Database error setting payment customer: {}", e)
        })?;

        self.payment_customer_id = Some(customer_id.to_string());
        info!("Linked user {} to payment customer {}", self.id, customer_id);

        Ok(())
    }

    /// Add purchased credits, returning the new balance
    pub async fn add_credits(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i32,
    ) -> crate::Result<i32> {
        let credits: i32 = sqlx::query_scalar(
            r#"
            UPDATE users SET credits = credits + $1, updated_at_utc = NOW()
            WHERE id = $2
            RETURNING credits
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .fetch_one(conn)
        .await
        .wrap_err_with(|| format!("Failed to add credits to user {user_id}"))?;

        info!(%user_id, amount, credits, "Credits added");

        Ok(credits)
    }

    /// Overwrite the balance, used by subscriptions
    pub async fn set_credits(
        conn: &mut PgConnection,
        user_id: Uuid,
        credits: i32,
    ) -> crate::Result<()> {
        sqlx::query("UPDATE users SET credits = $1, updated_at_utc = NOW() WHERE id = $2")
            .bind(credits)
            .bind(user_id)
            .execute(conn)
            .await
            .wrap_err_with(|| format!("Failed to set credits for user {user_id}"))?;

        info!(%user_id, credits, "Credits set");

        Ok(())
    }

    /// Store the provider's tokens for this user, encrypted with age
    pub async fn store_identity_tokens(
        &self,
        pool: &PgPool,
        tokens: &IdentityTokens,
        key: &std::sync::Arc<age::x25519::Identity>,
    ) -> crate::Result<()> {
        let access = encryption::encrypt(&tokens.access_token, key).await?;
        let refresh = match &tokens.refresh_token {
            Some(token) => Some(encryption::encrypt(token, key).await?),
            None => None,
        };
        let expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        sqlx::query(
            r#"
            INSERT INTO user_identities (user_id, access_token_encrypted, refresh_token_encrypted, expires_at_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET access_token_encrypted = EXCLUDED.access_token_encrypted,
                refresh_token_encrypted = EXCLUDED.refresh_token_encrypted,
                expires_at_utc = EXCLUDED.expires_at_utc,
                updated_at_utc = NOW()
            "#,
        )
        .bind(self.id)
        .bind(access)
        .bind(refresh)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, expires_at, user_agent, is_active, created_at_utc, updated_at_utc";

impl Session {
    /// Create a new session for a user
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        user_agent: Option<String>,
        duration_days: i64,
    ) -> crate::Result<Session> {
        let expires_at = Utc::now() + chrono::Duration::days(duration_days);

        let session = sqlx::query_as::<_, Session>(&format!(
            r#"
            INSERT INTO sessions (user_id, expires_at, user_agent)
            VALUES ($1, $2, $3)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(expires_at)
        .bind(user_agent)
        .fetch_one(pool)
        .await?;

        info!(
            "Created new session {} for user {} expiring at {}",
            session.id, user_id, expires_at
        );

        Ok(session)
    }

    /// Get a session by its ID
    pub async fn get_by_id(pool: &PgPool, session_id: Uuid) -> crate::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Check if this session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Invalidate this session
    pub async fn invalidate(&mut self, pool: &PgPool) -> crate::Result<()> {
        sqlx::query("UPDATE sessions SET is_active = FALSE, updated_at_utc = NOW() WHERE id = $1")
            .bind(self.id)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Failed to invalidate session {}: {:?}", self.id, e);
                eyre!("Database error invalidating session: {}", e)
            })?;

        self.is_active = false;
        info!("Session {} invalidated", self.id);

        Ok(())
    }

    /// Delete sessions that expired, or were logged out, more than `days` ago
    pub async fn purge_stale(pool: &PgPool, days: i64) -> crate::Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(days);

        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < $1
               OR (is_active = FALSE AND updated_at_utc < $1)
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
