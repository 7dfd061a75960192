use color_eyre::eyre::WrapErr as _;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_BUCKET: &str = "ai-images";

/// Owner segment used in keys for images generated by guests
pub const GUEST_OWNER: &str = "anonymous";

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub base_url: String,
    pub service_key: String,
    pub bucket: String,
}

impl StorageConfig {
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self {
            base_url: std::env::var("STORAGE_URL").wrap_err("STORAGE_URL must be set")?,
            service_key: std::env::var("STORAGE_SERVICE_KEY")
                .wrap_err("STORAGE_SERVICE_KEY must be set")?,
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage rejected upload of {key} with status {status}")]
    Upload { key: String, status: u16 },
    #[error("Storage rejected delete of {key} with status {status}")]
    Delete { key: String, status: u16 },
    #[error("Failed to reach object storage")]
    Transport(#[from] reqwest::Error),
}

/// Client for a Supabase-storage compatible REST API
#[derive(Clone)]
pub struct ObjectStorage {
    http: reqwest::Client,
    config: StorageConfig,
}

impl ObjectStorage {
    pub fn new(http: reqwest::Client, config: StorageConfig) -> Self {
        Self { http, config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base(), self.config.bucket, key)
    }

    /// Public, unsigned url for a stored object
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base(),
            self.config.bucket,
            key
        )
    }

    /// Upload a new object, failing if the key is already taken
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .http
            .post(self.object_url(key))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Upload {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }

        info!(key, "Uploaded object");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .http
            .delete(self.object_url(key))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Delete {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }

        info!(key, "Deleted object");
        Ok(())
    }

    /// Delete without failing the caller, for cleaning up after a failed request
    pub async fn delete_quietly(&self, key: &str) {
        if let Err(err) = self.delete(key).await {
            warn!(key, error = ?err, "Failed to clean up stored object");
        }
    }
}

/// `images/{owner}_{id}.{ext}`, owner being the user id or `anonymous`
pub fn storage_key(owner: Option<Uuid>, id: Uuid, extension: &str) -> String {
    let owner = owner
        .map(|id| id.to_string())
        .unwrap_or_else(|| GUEST_OWNER.to_string());

    format!("images/{owner}_{id}.{extension}")
}

/// Whether a key was issued for a guest generation
pub fn is_guest_key(key: &str) -> bool {
    key.strip_prefix("images/")
        .and_then(|rest| rest.strip_prefix(GUEST_OWNER))
        .is_some_and(|rest| rest.starts_with('_') && !rest.contains('/'))
}

/// Sniff the image type from its bytes, returning `(mime, extension)`
pub fn detect_image_type(bytes: &[u8]) -> (&'static str, &'static str) {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            (kind.mime_type(), kind.extension())
        }
        _ => ("image/png", "png"),
    }
}

/// File extension for a sniffed image mime type
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn keys_embed_owner_or_anonymous() {
        let id = Uuid::nil();
        let owner = Uuid::new_v4();

        assert_eq!(
            storage_key(None, id, "png"),
            format!("images/anonymous_{id}.png")
        );
        assert_eq!(
            storage_key(Some(owner), id, "webp"),
            format!("images/{owner}_{id}.webp")
        );
    }

    #[test]
    fn guest_keys_are_recognised() {
        let id = Uuid::new_v4();
        assert!(is_guest_key(&storage_key(None, id, "png")));
        assert!(!is_guest_key(&storage_key(Some(Uuid::new_v4()), id, "png")));
        assert!(!is_guest_key("images/anonymous_x/../../etc"));
        assert!(!is_guest_key("other/anonymous_x.png"));
    }

    #[test]
    fn detects_png_and_falls_back() {
        assert_eq!(detect_image_type(&PNG_MAGIC), ("image/png", "png"));
        assert_eq!(detect_image_type(b"not an image"), ("image/png", "png"));

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_image_type(&jpeg), ("image/jpeg", "jpg"));
    }

    #[test]
    fn extensions_follow_the_mime_type() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }

    #[test]
    fn public_url_uses_public_path() {
        let storage = ObjectStorage::new(
            reqwest::Client::new(),
            StorageConfig {
                base_url: "https://store.example.com/".to_string(),
                service_key: "key".to_string(),
                bucket: "ai-images".to_string(),
            },
        );

        assert_eq!(
            storage.public_url("images/a.png"),
            "https://store.example.com/storage/v1/object/public/ai-images/images/a.png"
        );
    }
}
