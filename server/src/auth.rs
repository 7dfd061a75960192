use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::USER_AGENT, request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    cookies::{secure_cookies, Cookie, CookieJar},
    errors::JsonError,
    state::AppState,
    user::{Session, User},
};

/// Cookie name for storing the session ID
pub const SESSION_COOKIE_NAME: &str = "imagic_session";

/// Cookie holding the OAuth `state` between `/login` and `/auth/callback`
pub const OAUTH_STATE_COOKIE_NAME: &str = "imagic_oauth_state";

/// Default session duration in days
pub const DEFAULT_SESSION_DURATION_DAYS: i64 = 30;

/// Extract the current user from the request if authenticated
///
/// Page routes use this; anonymous visitors are sent to `/login`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Ok(Some((user, session))) => Ok(AuthUser { user, session }),
            Ok(None) => {
                info!("No valid session, redirecting to login");
                Err(Redirect::to("/login").into_response())
            }
            Err(err) => {
                error!("Error loading session: {:?}", err);
                Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
        }
    }
}

/// Like [`AuthUser`] but rejects with a JSON 401 for the API routes
#[derive(Debug, Clone)]
pub struct ApiUser {
    pub user: User,
    #[allow(dead_code)]
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for ApiUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Ok(Some((user, session))) => Ok(ApiUser { user, session }),
            Ok(None) => Err(JsonError::unauthorized().into_response()),
            Err(err) => {
                error!("Error loading session: {:?}", err);
                Err(JsonError::internal("Internal server error").into_response())
            }
        }
    }
}

/// Extract the optional user from the request if authenticated
#[derive(Debug, Clone)]
pub struct OptionalUser {
    pub user: Option<User>,
    #[allow(dead_code)]
    pub session: Option<Session>,
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Ok(Some((user, session))) => Ok(OptionalUser {
                user: Some(user),
                session: Some(session),
            }),
            Ok(None) => Ok(OptionalUser {
                user: None,
                session: None,
            }),
            Err(err) => {
                error!("Error loading session: {:?}", err);
                Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
        }
    }
}

/// Resolve the session cookie to a live session and its user
///
/// Requests without a session cookie never touch the database.
async fn current_user(
    parts: &mut Parts,
    state: &AppState,
) -> crate::Result<Option<(User, Session)>> {
    let cookies = CookieJar::from_request_parts(parts, state)
        .await
        .map_err(|_| color_eyre::eyre::eyre!("Failed to extract cookies from request"))?;

    let Some(session_id) = get_session_id_from_cookie(&cookies) else {
        return Ok(None);
    };

    let Some(session) = validate_session(state, session_id).await? else {
        return Ok(None);
    };

    match User::get_by_id(&state.db, session.user_id).await? {
        Some(user) => Ok(Some((user, session))),
        None => {
            error!("No user found for session {}", session_id);
            Ok(None)
        }
    }
}

/// Get the session ID from the cookie
pub fn get_session_id_from_cookie(cookies: &CookieJar) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE_NAME)
        .and_then(|cookie| cookie.value().parse::<Uuid>().ok())
}

/// Load a session, treating expired or logged out sessions as missing
pub async fn validate_session(state: &AppState, session_id: Uuid) -> crate::Result<Option<Session>> {
    let session = Session::get_by_id(&state.db, session_id).await?;

    match session {
        Some(session) if session.is_expired() => {
            info!("Session {} is expired", session_id);
            Ok(None)
        }
        Some(session) if !session.is_active => {
            info!("Session {} is inactive", session_id);
            Ok(None)
        }
        other => Ok(other),
    }
}

/// Creates a session cookie for the given session ID
pub fn create_session_cookie(session_id: Uuid, duration_days: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure_cookies());
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::days(duration_days));
    cookie
}

/// Create a new session for a user and set a cookie
pub async fn create_session_and_set_cookie(
    state: &AppState,
    cookies: &CookieJar,
    user_id: Uuid,
    agent: Option<String>,
) -> crate::Result<Session> {
    let duration_days = DEFAULT_SESSION_DURATION_DAYS;

    let session = Session::create(&state.db, user_id, agent, duration_days).await?;
    cookies.add(create_session_cookie(session.id, duration_days));

    info!("Created new session {} for user {}", session.id, user_id);
    Ok(session)
}

/// Clear the session cookie and invalidate the session in the database
pub async fn end_session(state: &AppState, cookies: &CookieJar) -> crate::Result<()> {
    if let Some(session_id) = get_session_id_from_cookie(cookies) {
        if let Some(mut session) = Session::get_by_id(&state.db, session_id).await? {
            session.invalidate(&state.db).await?;
        }
    }

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure_cookies());

    cookies.remove(cookie);
    info!("Session cookie removed");

    Ok(())
}

/// Short lived cookie carrying the OAuth state parameter
pub fn create_oauth_state_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(OAUTH_STATE_COOKIE_NAME, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure_cookies());
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::minutes(10));
    cookie
}

/// Pull the user agent out of request headers for session bookkeeping
pub fn user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
