//! Generation allowance for signed in users and guests.
//!
//! Signed in users spend credits stored on their row. Guests get a small daily
//! allowance tracked in a private cookie, which is best effort only: a guest
//! racing two tabs can go one over.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use color_eyre::eyre::WrapErr as _;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::cookies::{secure_cookies, Cookie, CookieJar};
use crate::user::User;

pub const GUEST_USAGE_COOKIE_NAME: &str = "imagic_guest_usage";

pub const DEFAULT_GUEST_LIMIT: i32 = 2;
pub const DEFAULT_SIGNUP_CREDITS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    pub guest_limit: i32,
    pub signup_credits: i32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            guest_limit: DEFAULT_GUEST_LIMIT,
            signup_credits: DEFAULT_SIGNUP_CREDITS,
        }
    }
}

impl UsageLimits {
    pub fn from_env() -> crate::Result<Self> {
        let guest_limit = match std::env::var("GUEST_GENERATION_LIMIT") {
            Ok(v) => v.parse().wrap_err("GUEST_GENERATION_LIMIT must be a number")?,
            Err(_) => DEFAULT_GUEST_LIMIT,
        };
        let signup_credits = match std::env::var("SIGNUP_CREDITS") {
            Ok(v) => v.parse().wrap_err("SIGNUP_CREDITS must be a number")?,
            Err(_) => DEFAULT_SIGNUP_CREDITS,
        };

        Ok(Self {
            guest_limit,
            signup_credits,
        })
    }
}

/// The next UTC midnight strictly after `now`
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

/// Guest generations counted so far in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUsage {
    pub used: i32,
    pub reset_at: DateTime<Utc>,
}

impl GuestUsage {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            used: 0,
            reset_at: next_reset(now),
        }
    }

    /// The usage as of `now`, starting over once the reset time has passed
    pub fn current(self, now: DateTime<Utc>) -> Self {
        if now >= self.reset_at {
            Self::fresh(now)
        } else {
            self
        }
    }

    pub fn record(self, now: DateTime<Utc>) -> Self {
        let mut usage = self.current(now);
        usage.used += 1;
        usage
    }

    /// Read from the private cookie, treating a missing or tampered cookie as unused
    pub fn from_cookies(cookies: &CookieJar, now: DateTime<Utc>) -> Self {
        cookies
            .get(GUEST_USAGE_COOKIE_NAME)
            .and_then(|c| serde_json::from_str::<GuestUsage>(c.value()).ok())
            .map(|usage| usage.current(now))
            .unwrap_or_else(|| Self::fresh(now))
    }

    pub fn to_cookie(&self) -> crate::Result<Cookie<'static>> {
        let mut cookie = Cookie::new(GUEST_USAGE_COOKIE_NAME, serde_json::to_string(self)?);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(secure_cookies());
        cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
        cookie.set_max_age(time::Duration::days(1));
        Ok(cookie)
    }
}

/// Who is asking to generate
#[derive(Debug, Clone)]
pub enum Requester {
    User(User),
    Guest(GuestUsage),
}

impl Requester {
    pub fn user(&self) -> Option<&User> {
        match self {
            Requester::User(user) => Some(user),
            Requester::Guest(_) => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Requester::Guest(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    pub allowed: bool,
    pub is_guest: bool,
    pub remaining: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn can_generate(requester: &Requester, limits: &UsageLimits) -> LimitStatus {
    match requester {
        Requester::User(user) => user_status(user.credits),
        Requester::Guest(usage) => {
            let remaining = (limits.guest_limit - usage.used).max(0);
            LimitStatus {
                allowed: remaining > 0,
                is_guest: true,
                remaining,
                usage: Some(usage.used),
                max: Some(limits.guest_limit),
                message: (remaining == 0)
                    .then(|| "Free generations used. Sign up for more!".to_string()),
            }
        }
    }
}

pub fn user_status(credits: i32) -> LimitStatus {
    LimitStatus {
        allowed: credits > 0,
        is_guest: false,
        remaining: credits.max(0),
        usage: None,
        max: None,
        message: (credits <= 0)
            .then(|| "No credits remaining. Please purchase more.".to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("No credits remaining")]
    InsufficientCredits,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Spend one credit, returning the balance left
///
/// Runs as a conditional update so concurrent requests can never take the
/// balance below zero. Call it inside the transaction that records the image
/// so a failed insert gives the credit back.
pub async fn consume_credit(conn: &mut PgConnection, user_id: Uuid) -> Result<i32, CreditError> {
    let remaining: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE users SET credits = credits - 1, updated_at_utc = NOW()
        WHERE id = $1 AND credits > 0
        RETURNING credits
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    match remaining {
        Some(remaining) => {
            info!(%user_id, remaining, "Credit consumed");
            Ok(remaining)
        }
        None => Err(CreditError::InsufficientCredits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn next_reset_is_following_midnight() {
        assert_eq!(
            next_reset(at(13, 45)),
            Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            next_reset(at(0, 0)),
            Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn guest_usage_resets_after_midnight() {
        let usage = GuestUsage::fresh(at(10, 0)).record(at(10, 0)).record(at(11, 0));
        assert_eq!(usage.used, 2);

        let next_day = Utc.with_ymd_and_hms(2025, 3, 15, 0, 1, 0).unwrap();
        assert_eq!(usage.current(next_day).used, 0);
        assert_eq!(usage.record(next_day).used, 1);
    }

    #[test]
    fn guest_status_counts_down_to_zero() {
        let limits = UsageLimits::default();
        let now = at(9, 0);

        let fresh = can_generate(&Requester::Guest(GuestUsage::fresh(now)), &limits);
        assert!(fresh.allowed);
        assert!(fresh.is_guest);
        assert_eq!(fresh.remaining, 2);
        assert_eq!(fresh.max, Some(2));
        assert_eq!(fresh.message, None);

        let used_up = GuestUsage::fresh(now).record(now).record(now);
        let status = can_generate(&Requester::Guest(used_up), &limits);
        assert!(!status.allowed);
        assert_eq!(status.remaining, 0);
        assert!(status.message.is_some());
    }

    #[test]
    fn guest_over_the_limit_reports_zero_remaining() {
        let now = at(9, 0);
        let usage = GuestUsage { used: 5, reset_at: next_reset(now) };
        let status = can_generate(&Requester::Guest(usage), &UsageLimits::default());
        assert_eq!(status.remaining, 0);
        assert!(!status.allowed);
    }

    #[test]
    fn user_status_follows_credits() {
        let status = user_status(3);
        assert!(status.allowed);
        assert!(!status.is_guest);
        assert_eq!(status.remaining, 3);

        let empty = user_status(0);
        assert!(!empty.allowed);
        assert_eq!(
            empty.message.as_deref(),
            Some("No credits remaining. Please purchase more.")
        );
    }

    #[test]
    fn limit_status_serializes_camel_case_and_skips_empty_fields() {
        let value = serde_json::to_value(user_status(4)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "allowed": true, "isGuest": false, "remaining": 4 })
        );
    }
}
