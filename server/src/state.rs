use std::sync::Arc;
use std::time::Duration;

use age::x25519::Identity;
use color_eyre::eyre::{eyre, WrapErr as _};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    billing::{payments::PaymentsClient, plans::PlanCatalog, PaymentsConfig},
    cookies::CookieKey,
    credits::UsageLimits,
    generation::model::{ImageModel, ImageModelConfig, OpenAiImageModel},
    identity::{IdentityProvider, IdentityProviderConfig},
    migration::GuestClaims,
    storage::{ObjectStorage, StorageConfig},
};

/// This struct holds the age encryption keys used for encrypting sensitive data in the database
#[derive(Clone)]
pub struct EncryptionConfig {
    pub key: Arc<Identity>,
}

impl EncryptionConfig {
    pub fn from_env() -> crate::Result<Self> {
        use std::str::FromStr;

        let key_str = std::env::var("ENCRYPTION_KEY")
            .map_err(|_| eyre!("ENCRYPTION_KEY environment variable not set"))?;

        let key = Identity::from_str(&key_str)
            .map_err(|e| eyre!("Failed to parse ENCRYPTION_KEY: {}", e))?;

        Ok(Self { key: Arc::new(key) })
    }

    pub fn generate() -> Self {
        Self {
            key: Arc::new(Identity::generate()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cookie_key: CookieKey,
    pub domain: String,
    pub protocol: String,
    pub http: reqwest::Client,
    pub encryption: EncryptionConfig,
    pub image_model: Arc<dyn ImageModel>,
    pub storage: ObjectStorage,
    pub payments: PaymentsClient,
    pub identity: IdentityProvider,
    pub limits: UsageLimits,
    pub plans: PlanCatalog,
    pub claims: GuestClaims,
}

impl AppState {
    pub async fn from_env() -> crate::Result<Self> {
        let pool = setup_db_pool().await?;

        let cookie_key = CookieKey::from_env_or_generate()?;
        let http = build_http_client()?;

        let image_model = OpenAiImageModel::new(http.clone(), ImageModelConfig::from_env()?);
        let storage = ObjectStorage::new(http.clone(), StorageConfig::from_env()?);
        let payments = PaymentsClient::new(http.clone(), PaymentsConfig::from_env()?);
        let identity = IdentityProvider::new(http.clone(), IdentityProviderConfig::from_env()?);
        let claims = GuestClaims::from_cookie_key(&cookie_key);

        Ok(Self {
            db: pool,
            cookie_key,
            domain: std::env::var("DOMAIN").wrap_err("DOMAIN must be set")?,
            protocol: std::env::var("PROTO").unwrap_or_else(|_| "https".to_string()),
            http,
            encryption: EncryptionConfig::from_env()?,
            image_model: Arc::new(image_model),
            storage,
            payments,
            identity,
            limits: UsageLimits::from_env()?,
            plans: PlanCatalog::from_env(),
            claims,
        })
    }

    /// Public base url of this deployment, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }

    /// The callback the identity provider redirects back to after sign in
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.base_url())
    }

}

impl cja::app_state::AppState for AppState {
    fn version(&self) -> &str {
        env!("VERGEN_GIT_SHA")
    }

    fn db(&self) -> &sqlx::PgPool {
        &self.db
    }

    fn cookie_key(&self) -> &CookieKey {
        &self.cookie_key
    }
}

pub fn build_http_client() -> crate::Result<reqwest::Client> {
    let client = reqwest::ClientBuilder::new()
        .timeout(Duration::from_secs(60))
        .use_rustls_tls()
        .build()?;

    Ok(client)
}

#[tracing::instrument(err)]
pub async fn setup_db_pool() -> crate::Result<PgPool> {
    const MIGRATION_LOCK_ID: i64 = 0xDB_DB_DB_DB_DB_DB_DB;

    let database_url = std::env::var("DATABASE_URL").wrap_err("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&pool)
        .await?;

    sqlx::migrate!("../migrations").run(&pool).await?;

    let unlocked: Option<bool> = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .fetch_one(&pool)
        .await?;

    match unlocked {
        Some(true) => tracing::info!("Migration lock unlocked"),
        Some(false) => tracing::info!("Failed to unlock migration lock"),
        None => return Err(eyre!("Failed to unlock migration lock")),
    }

    Ok(pool)
}
