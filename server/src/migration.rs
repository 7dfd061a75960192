//! Moving images generated as a guest into a signed in user's history.
//!
//! Guest images live only in the browser until sign in. Each one carries a
//! `claim`, an HMAC over its storage key and creation time issued at
//! generation, so an account can only adopt keys that were actually handed
//! to that browser, dated when they were made.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cookies::CookieKey;
use crate::generation::{Orientation, PROMPT_MAX_CHARS};
use crate::images::{Image, NewImage};
use crate::storage::{is_guest_key, ObjectStorage};

#[derive(Clone)]
pub struct GuestClaims {
    key: hmac::Key,
}

impl GuestClaims {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Derive a dedicated signing key from the cookie key
    pub fn from_cookie_key(cookie_key: &CookieKey) -> Self {
        let master = hmac::Key::new(hmac::HMAC_SHA256, cookie_key.master());
        let derived = hmac::sign(&master, b"imagic guest claims");
        Self::new(derived.as_ref())
    }

    pub fn issue(&self, storage_key: &str, created_at: DateTime<Utc>) -> String {
        let tag = hmac::sign(&self.key, &claim_message(storage_key, created_at));
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag.as_ref())
    }

    pub fn verify(&self, storage_key: &str, created_at: DateTime<Utc>, claim: &str) -> bool {
        let Ok(tag) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(claim) else {
            return false;
        };

        hmac::verify(&self.key, &claim_message(storage_key, created_at), &tag).is_ok()
    }
}

fn claim_message(storage_key: &str, created_at: DateTime<Utc>) -> Vec<u8> {
    format!("{storage_key}|{}", created_at.timestamp_micros()).into_bytes()
}

/// A guest generation as held in browser storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalImage {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub color_scheme: Option<String>,
    pub orientation: String,
    pub guidance_scale: f64,
    #[serde(default)]
    pub seed: Option<i64>,
    pub image_url: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub claim: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Migrated,
    Skipped,
    Error,
}

/// Outcome for one local image. `id` is the browser's id for the item so
/// the client can drop it from its cache; `image_id` is the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    pub status: MigrationStatus,
    pub message: String,
}

impl MigrationResult {
    fn new(id: impl Into<String>, status: MigrationStatus, message: &str) -> Self {
        Self {
            id: id.into(),
            image_id: None,
            status,
            message: message.to_string(),
        }
    }

    fn with_image(mut self, image_id: Uuid) -> Self {
        self.image_id = Some(image_id);
        self
    }
}

/// Reasons a single local image is refused before touching the database
fn check_local_image(image: &LocalImage, claims: &GuestClaims) -> Result<(), &'static str> {
    if !is_guest_key(&image.storage_key) {
        return Err("Not a guest image");
    }
    if !claims.verify(&image.storage_key, image.created_at, &image.claim) {
        return Err("Invalid claim");
    }
    let prompt_len = image.prompt.trim().chars().count();
    if prompt_len == 0 || prompt_len > PROMPT_MAX_CHARS {
        return Err("Invalid prompt");
    }
    if Orientation::parse(&image.orientation).is_none() {
        return Err("Invalid orientation");
    }
    if !(0.0..=10.0).contains(&image.guidance_scale) {
        return Err("Invalid guidance scale");
    }
    Ok(())
}

/// Import each local image for `user_id`
///
/// Every item gets its own result; one bad item never fails the batch.
pub async fn migrate_local(
    pool: &PgPool,
    storage: &ObjectStorage,
    claims: &GuestClaims,
    user_id: Uuid,
    items: Vec<serde_json::Value>,
) -> Vec<MigrationResult> {
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let fallback_id = item
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let local = match serde_json::from_value::<LocalImage>(item) {
            Ok(local) => local,
            Err(err) => {
                warn!(id = %fallback_id, error = %err, "Malformed local image");
                results.push(MigrationResult::new(
                    fallback_id,
                    MigrationStatus::Error,
                    "Invalid image data",
                ));
                continue;
            }
        };

        if let Err(reason) = check_local_image(&local, claims) {
            warn!(id = %local.id, reason, "Rejected local image");
            results.push(MigrationResult::new(local.id, MigrationStatus::Error, reason));
            continue;
        }

        results.push(migrate_one(pool, storage, user_id, local).await);
    }

    let migrated = results
        .iter()
        .filter(|r| r.status == MigrationStatus::Migrated)
        .count();
    info!(%user_id, migrated, total = results.len(), "Local image migration finished");

    results
}

async fn migrate_one(
    pool: &PgPool,
    storage: &ObjectStorage,
    user_id: Uuid,
    local: LocalImage,
) -> MigrationResult {
    let local_id = local.id.clone();

    try_migrate_one(pool, storage, user_id, local)
        .await
        .unwrap_or_else(|err| {
            error!(id = %local_id, error = ?err, "Error migrating local image");
            MigrationResult::new(
                local_id,
                MigrationStatus::Error,
                "Failed to migrate to database",
            )
        })
}

async fn try_migrate_one(
    pool: &PgPool,
    storage: &ObjectStorage,
    user_id: Uuid,
    local: LocalImage,
) -> crate::Result<MigrationResult> {
    let mut conn = pool.acquire().await?;

    if let Some(existing) = Image::get_by_storage_key(&mut conn, &local.storage_key).await? {
        return Ok(MigrationResult::new(
            local.id,
            MigrationStatus::Skipped,
            "Image already exists in database",
        )
        .with_image(existing.id));
    }

    let new = NewImage {
        user_id,
        prompt: local.prompt.trim().to_string(),
        negative_prompt: crate::validation::non_empty(local.negative_prompt),
        color_scheme: crate::validation::non_empty(local.color_scheme),
        orientation: local.orientation,
        guidance_scale: local.guidance_scale,
        seed: local.seed,
        image_url: storage.public_url(&local.storage_key),
        storage_key: local.storage_key,
        created_at: Some(local.created_at),
    };

    let result = match Image::insert_if_absent(&mut conn, &new).await? {
        Some(image) => MigrationResult::new(
            local.id,
            MigrationStatus::Migrated,
            "Successfully migrated to database",
        )
        .with_image(image.id),
        None => MigrationResult::new(
            local.id,
            MigrationStatus::Skipped,
            "Image already exists in database",
        ),
    };

    Ok(result)
}
