use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
};
use color_eyre::eyre::eyre;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    auth::{
        create_oauth_state_cookie, create_session_and_set_cookie, end_session, user_agent,
        OAUTH_STATE_COOKIE_NAME,
    },
    cookies::{Cookie, CookieJar},
    errors::{ServerError, ServerResult, WithRedirect as _},
    identity::generate_state,
    state::AppState,
    user::User,
};

/// Where a failed sign in lands
const LOGIN_FAILED: &str = "/?login_error=1";

/// Send the browser to the identity provider
pub async fn login(
    State(state): State<AppState>,
    cookies: CookieJar,
) -> ServerResult<Redirect, Redirect> {
    let oauth_state = generate_state();
    let url = state
        .identity
        .authorize_url(&state.redirect_uri(), &oauth_state)
        .with_redirect(Redirect::to(LOGIN_FAILED))?;

    cookies.add(create_oauth_state_cookie(oauth_state));

    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn failed(message: String) -> ServerError<Redirect> {
    ServerError(eyre!(message), Redirect::to(LOGIN_FAILED))
}

pub async fn callback(
    State(state): State<AppState>,
    cookies: CookieJar,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> ServerResult<Redirect, Redirect> {
    let expected_state = cookies
        .get(OAUTH_STATE_COOKIE_NAME)
        .map(|c| c.value().to_string());

    let mut state_cookie = Cookie::new(OAUTH_STATE_COOKIE_NAME, "");
    state_cookie.set_path("/");
    cookies.remove(state_cookie);

    if let Some(error) = params.error {
        return Err(failed(format!(
            "Identity provider returned an error: {error} {}",
            params.error_description.unwrap_or_default()
        )));
    }

    let Some(code) = params.code else {
        return Err(failed("Callback without a code".to_string()));
    };

    match (expected_state.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(returned)) if expected == returned => {}
        _ => return Err(failed("OAuth state mismatch".to_string())),
    }

    let redirect_uri = state.redirect_uri();
    let tokens = state
        .identity
        .exchange_code(&code, &redirect_uri)
        .await
        .with_redirect(Redirect::to(LOGIN_FAILED))?;

    let info = state
        .identity
        .fetch_userinfo(&tokens.access_token)
        .await
        .with_redirect(Redirect::to(LOGIN_FAILED))?;

    let user = User::upsert_from_identity(&state.db, &info, state.limits.signup_credits)
        .await
        .with_redirect(Redirect::to(LOGIN_FAILED))?;

    if let Err(err) = user
        .store_identity_tokens(&state.db, &tokens, &state.encryption.key)
        .await
    {
        warn!(user_id = %user.id, error = ?err, "Failed to store identity tokens");
    }

    create_session_and_set_cookie(&state, &cookies, user.id, user_agent(&headers))
        .await
        .with_redirect(Redirect::to(LOGIN_FAILED))?;

    info!(user_id = %user.id, "User signed in");

    Ok(Redirect::to("/generate?migrate=1"))
}

pub async fn logout(
    State(state): State<AppState>,
    cookies: CookieJar,
) -> ServerResult<Redirect, Redirect> {
    end_session(&state, &cookies)
        .await
        .with_redirect(Redirect::to("/"))?;

    Ok(Redirect::to("/"))
}
