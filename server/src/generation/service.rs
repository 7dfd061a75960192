//! The generate flow shared by the JSON API and the `/generate` page.

use axum::http::StatusCode;
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use super::model::{ImageModelError, ImagePrompt};
use super::{GenerateImageInput, GenerationRequest};
use crate::credits::{self, can_generate, CreditError, GuestUsage, LimitStatus, Requester};
use crate::errors::JsonError;
use crate::images::{Image, NewImage};
use crate::migration::LocalImage;
use crate::state::AppState;
use crate::storage::{extension_for_mime, storage_key, StorageError};
use crate::validation::Issue;

#[derive(Debug)]
pub enum Generated {
    /// Saved to the user's history, one credit spent
    Saved { image: Image, limit: LimitStatus },
    /// Returned to the guest's browser; the caller must persist `usage`
    Local {
        image: LocalImage,
        usage: GuestUsage,
        limit: LimitStatus,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Generation limit reached")]
    LimitReached(LimitStatus),
    #[error("Invalid generation request")]
    Invalid(Vec<Issue>),
    #[error("No credits remaining")]
    InsufficientCredits,
    #[error(transparent)]
    Model(#[from] ImageModelError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Internal(color_eyre::Report),
}

impl GenerateError {
    pub fn to_json_error(&self) -> JsonError {
        match self {
            GenerateError::LimitReached(status) => JsonError::new(
                StatusCode::TOO_MANY_REQUESTS,
                status
                    .message
                    .clone()
                    .unwrap_or_else(|| "Generation limit reached".to_string()),
            ),
            GenerateError::Invalid(issues) => JsonError::invalid(issues.clone()),
            GenerateError::InsufficientCredits => JsonError::new(
                StatusCode::PAYMENT_REQUIRED,
                "No credits remaining. Please purchase more.",
            ),
            GenerateError::Model(err) => JsonError::new(err.status(), err.public_message()),
            GenerateError::Storage(_) => {
                JsonError::new(StatusCode::BAD_GATEWAY, "Failed to upload image")
            }
            GenerateError::Internal(_) => JsonError::internal("Failed to generate image"),
        }
    }
}

impl From<color_eyre::Report> for GenerateError {
    fn from(err: color_eyre::Report) -> Self {
        GenerateError::Internal(err)
    }
}

impl From<CreditError> for GenerateError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::InsufficientCredits => GenerateError::InsufficientCredits,
            CreditError::Database(e) => GenerateError::Internal(e.into()),
        }
    }
}

/// Check the allowance, call the model, store the result and account for it
#[tracing::instrument(skip_all, fields(guest = requester.is_guest()))]
pub async fn generate(
    state: &AppState,
    requester: Requester,
    input: GenerateImageInput,
) -> Result<Generated, GenerateError> {
    let status = can_generate(&requester, &state.limits);
    if !status.allowed {
        return Err(GenerateError::LimitReached(status));
    }

    let request = input.validate().map_err(GenerateError::Invalid)?;

    let generated = state
        .image_model
        .generate(&ImagePrompt::from(&request))
        .await?;

    let owner = requester.user().map(|u| u.id);
    let key = storage_key(owner, Uuid::new_v4(), extension_for_mime(&generated.mime));

    state
        .storage
        .upload(&key, generated.bytes, &generated.mime)
        .await?;
    let image_url = state.storage.public_url(&key);

    match requester {
        Requester::User(user) => {
            match save_for_user(state, user.id, &request, &key, &image_url).await {
                Ok((image, remaining)) => Ok(Generated::Saved {
                    image,
                    limit: credits::user_status(remaining),
                }),
                Err(err) => {
                    error!(key, error = ?err, "Failed to save generated image, removing upload");
                    state.storage.delete_quietly(&key).await;
                    Err(err)
                }
            }
        }
        Requester::Guest(usage) => {
            let usage = usage.record(Utc::now());
            let limit = can_generate(&Requester::Guest(usage), &state.limits);

            let created_at = Utc::now();
            let image = LocalImage {
                id: Uuid::new_v4().to_string(),
                prompt: request.prompt,
                negative_prompt: request.negative_prompt,
                color_scheme: request.color_scheme.map(|s| s.as_str().to_string()),
                orientation: request.orientation.as_str().to_string(),
                guidance_scale: request.guidance_scale,
                seed: Some(request.seed),
                image_url,
                claim: state.claims.issue(&key, created_at),
                storage_key: key,
                created_at,
            };

            info!(key = %image.storage_key, used = usage.used, "Guest image generated");

            Ok(Generated::Local {
                image,
                usage,
                limit,
            })
        }
    }
}

/// Spend a credit and record the image in one transaction
async fn save_for_user(
    state: &AppState,
    user_id: Uuid,
    request: &GenerationRequest,
    key: &str,
    image_url: &str,
) -> Result<(Image, i32), GenerateError> {
    let mut tx = state.db.begin().await.map_err(color_eyre::Report::from)?;

    let remaining = credits::consume_credit(&mut tx, user_id).await?;

    let image = Image::insert(
        &mut tx,
        &NewImage {
            user_id,
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            color_scheme: request.color_scheme.map(|s| s.as_str().to_string()),
            orientation: request.orientation.as_str().to_string(),
            guidance_scale: request.guidance_scale,
            seed: Some(request.seed),
            image_url: image_url.to_string(),
            storage_key: key.to_string(),
            created_at: None,
        },
    )
    .await?;

    tx.commit().await.map_err(color_eyre::Report::from)?;

    Ok((image, remaining))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_api_statuses() {
        let limit = credits::user_status(0);
        assert_eq!(
            GenerateError::LimitReached(limit).to_json_error().status,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GenerateError::InsufficientCredits.to_json_error().status,
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            GenerateError::Invalid(vec![Issue::new("prompt", "Prompt is too long")])
                .to_json_error()
                .status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GenerateError::Model(ImageModelError::RateLimited)
                .to_json_error()
                .status,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GenerateError::Storage(StorageError::Upload {
                key: "k".into(),
                status: 500
            })
            .to_json_error()
            .status,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn limit_message_is_passed_through() {
        let status = credits::user_status(0);
        let err = GenerateError::LimitReached(status).to_json_error();
        assert_eq!(err.message, "No credits remaining. Please purchase more.");
    }
}
