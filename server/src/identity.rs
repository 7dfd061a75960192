//! Client for the delegated identity provider (OAuth 2 authorization code flow).
//!
//! Sign in and sign up both happen at the provider, this server only ever sees
//! the resulting `code`, which it trades for tokens and a userinfo profile.

use base64::Engine as _;
use color_eyre::eyre::{eyre, WrapErr as _};
use rand::RngCore as _;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct IdentityProviderConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl IdentityProviderConfig {
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self {
            base_url: std::env::var("IDP_URL").wrap_err("IDP_URL must be set")?,
            client_id: std::env::var("IDP_CLIENT_ID").wrap_err("IDP_CLIENT_ID must be set")?,
            client_secret: std::env::var("IDP_CLIENT_SECRET")
                .wrap_err("IDP_CLIENT_SECRET must be set")?,
        })
    }
}

/// Tokens returned from the provider's token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Profile returned from the provider's userinfo endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserInfo {
    pub fn display_name(&self) -> Option<String> {
        self.preferred_username
            .clone()
            .or_else(|| self.name.clone())
    }
}

#[derive(Serialize)]
struct AuthorizeQuery<'a> {
    response_type: &'a str,
    client_id: &'a str,
    redirect_uri: &'a str,
    scope: &'a str,
    state: &'a str,
}

#[derive(Serialize)]
struct TokenForm<'a> {
    grant_type: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Clone)]
pub struct IdentityProvider {
    http: reqwest::Client,
    config: IdentityProviderConfig,
}

impl IdentityProvider {
    pub fn new(http: reqwest::Client, config: IdentityProviderConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> crate::Result<String> {
        let query = serde_urlencoded::to_string(AuthorizeQuery {
            response_type: "code",
            client_id: &self.config.client_id,
            redirect_uri,
            scope: "openid profile email",
            state,
        })?;

        Ok(format!("{}?{}", self.endpoint("/oauth/authorize"), query))
    }

    #[tracing::instrument(skip(self, code), err)]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> crate::Result<IdentityTokens> {
        let response = self
            .http
            .post(self.endpoint("/oauth/token"))
            .form(&TokenForm {
                grant_type: "authorization_code",
                code,
                redirect_uri,
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
            })
            .send()
            .await
            .wrap_err("Failed to reach identity provider token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Token exchange rejected");
            return Err(eyre!("Token exchange failed with status {}", status));
        }

        let tokens = response.json::<IdentityTokens>().await?;
        info!("Exchanged authorization code for tokens");

        Ok(tokens)
    }

    #[tracing::instrument(skip_all, err)]
    pub async fn fetch_userinfo(&self, access_token: &str) -> crate::Result<UserInfo> {
        let response = self
            .http
            .get(self.endpoint("/oauth/userinfo"))
            .bearer_auth(access_token)
            .send()
            .await
            .wrap_err("Failed to reach identity provider userinfo endpoint")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "Userinfo request failed with status {}",
                response.status()
            ));
        }

        Ok(response.json::<UserInfo>().await?)
    }
}

/// Random value for the OAuth `state` parameter
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> IdentityProvider {
        IdentityProvider::new(
            reqwest::Client::new(),
            IdentityProviderConfig {
                base_url: "https://id.example.com/".to_string(),
                client_id: "imagic".to_string(),
                client_secret: "shh".to_string(),
            },
        )
    }

    #[test]
    fn authorize_url_carries_client_state_and_redirect() {
        let url = provider()
            .authorize_url("https://imagic.test/auth/callback", "abc123")
            .unwrap();

        assert!(url.starts_with("https://id.example.com/oauth/authorize?"));
        assert!(url.contains("client_id=imagic"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fimagic.test%2Fauth%2Fcallback"));
        assert!(url.contains("response_type=code"));
    }

    #[test]
    fn generated_states_are_unique_and_url_safe() {
        let a = generate_state();
        let b = generate_state();

        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn display_name_prefers_username() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "user-1",
            "name": "Ada Lovelace",
            "preferred_username": "ada"
        }))
        .unwrap();
        assert_eq!(info.display_name().as_deref(), Some("ada"));

        let info: UserInfo = serde_json::from_value(serde_json::json!({ "sub": "user-2" })).unwrap();
        assert_eq!(info.display_name(), None);
    }
}
