use async_trait::async_trait;
use axum::http::StatusCode;
use base64::Engine as _;
use color_eyre::eyre::WrapErr as _;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{GenerationRequest, Orientation};
use crate::storage::detect_image_type;

pub const DEFAULT_IMAGE_MODEL_URL: &str = "https://api.openai.com";
pub const DEFAULT_IMAGE_MODEL_NAME: &str = "dall-e-2";

#[derive(Clone, Debug)]
pub struct ImageModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ImageModelConfig {
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self {
            base_url: std::env::var("IMAGE_MODEL_URL")
                .unwrap_or_else(|_| DEFAULT_IMAGE_MODEL_URL.to_string()),
            api_key: std::env::var("IMAGE_MODEL_API_KEY")
                .wrap_err("IMAGE_MODEL_API_KEY must be set")?,
            model: std::env::var("IMAGE_MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_IMAGE_MODEL_NAME.to_string()),
        })
    }
}

/// What gets sent to the model once a request is validated
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePrompt {
    pub prompt: String,
    pub orientation: Orientation,
    pub guidance_scale: f64,
    pub seed: i64,
}

impl From<&GenerationRequest> for ImagePrompt {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            prompt: request.compose_prompt(),
            orientation: request.orientation,
            guidance_scale: request.guidance_scale,
            seed: request.seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl GeneratedImage {
    /// The generations API returns bare base64, so the type is sniffed
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let (mime, _) = detect_image_type(&bytes);
        Self {
            bytes,
            mime: mime.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageModelError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid API key")]
    Unauthorized,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Image model returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("No image data received from the image model")]
    EmptyResponse,
    #[error("Image model returned undecodable image data")]
    Decode(#[from] base64::DecodeError),
    #[error("Failed to reach the image model")]
    Transport(#[from] reqwest::Error),
}

impl ImageModelError {
    /// HTTP status surfaced to our own clients
    pub fn status(&self) -> StatusCode {
        match self {
            ImageModelError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ImageModelError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show to the end user
    pub fn public_message(&self) -> String {
        match self {
            ImageModelError::InvalidRequest(_) | ImageModelError::RateLimited => self.to_string(),
            _ => "Failed to generate image".to_string(),
        }
    }
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, prompt: &ImagePrompt) -> Result<GeneratedImage, ImageModelError>;
}

/// Client for an OpenAI compatible `/v1/images/generations` endpoint
pub struct OpenAiImageModel {
    http: reqwest::Client,
    config: ImageModelConfig,
}

#[derive(Serialize)]
struct GenerationsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct GenerationsResponse {
    data: Vec<GenerationsDatum>,
}

#[derive(Deserialize)]
struct GenerationsDatum {
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Output size for a model; dall-e-2 only does squares
pub fn size_for(model: &str, orientation: Orientation) -> &'static str {
    if model == "dall-e-2" {
        return "512x512";
    }

    match orientation {
        Orientation::Landscape => "1792x1024",
        Orientation::Portrait => "1024x1792",
        Orientation::Square => "1024x1024",
    }
}

impl OpenAiImageModel {
    pub fn new(http: reqwest::Client, config: ImageModelConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/images/generations",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ImageModel for OpenAiImageModel {
    #[tracing::instrument(skip_all, fields(model = %self.config.model))]
    async fn generate(&self, prompt: &ImagePrompt) -> Result<GeneratedImage, ImageModelError> {
        let body = GenerationsRequest {
            model: &self.config.model,
            prompt: &prompt.prompt,
            n: 1,
            size: size_for(&self.config.model, prompt.orientation),
            response_format: "b64_json",
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.to_string());

            error!(%status, %message, "Image model rejected request");

            return Err(match status {
                StatusCode::BAD_REQUEST => ImageModelError::InvalidRequest(message),
                StatusCode::UNAUTHORIZED => ImageModelError::Unauthorized,
                StatusCode::TOO_MANY_REQUESTS => ImageModelError::RateLimited,
                _ => ImageModelError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let parsed = response.json::<GenerationsResponse>().await?;
        let encoded = parsed
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or(ImageModelError::EmptyResponse)?;

        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        info!(bytes = bytes.len(), "Image generated");

        Ok(GeneratedImage::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dall_e_2_is_always_square() {
        for orientation in Orientation::ALL {
            assert_eq!(size_for("dall-e-2", orientation), "512x512");
        }
    }

    #[test]
    fn other_models_follow_orientation() {
        assert_eq!(size_for("dall-e-3", Orientation::Landscape), "1792x1024");
        assert_eq!(size_for("dall-e-3", Orientation::Portrait), "1024x1792");
        assert_eq!(size_for("dall-e-3", Orientation::Square), "1024x1024");
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            ImageModelError::InvalidRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ImageModelError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ImageModelError::Unauthorized.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ImageModelError::EmptyResponse.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn upstream_details_are_hidden_from_users() {
        let err = ImageModelError::Api {
            status: 500,
            message: "internal stack trace".into(),
        };
        assert_eq!(err.public_message(), "Failed to generate image");
        assert_eq!(
            ImageModelError::RateLimited.public_message(),
            "Rate limit exceeded. Please try again later."
        );
    }

    #[test]
    fn generated_images_carry_a_sniffed_mime() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(GeneratedImage::from_bytes(jpeg).mime, "image/jpeg");

        let unknown = GeneratedImage::from_bytes(b"????".to_vec());
        assert_eq!(unknown.mime, "image/png");
        assert_eq!(unknown.bytes, b"????");
    }

    #[test]
    fn prompt_is_composed_from_request() {
        let request = GenerationRequest {
            prompt: "A harbour".to_string(),
            negative_prompt: Some("boats".to_string()),
            color_scheme: Some(super::super::ColorScheme::Pastel),
            orientation: Orientation::Portrait,
            guidance_scale: 5.0,
            seed: 9,
        };

        let prompt = ImagePrompt::from(&request);
        assert_eq!(
            prompt.prompt,
            "A harbour Use a Pastel color scheme. Avoid: boats."
        );
        assert_eq!(prompt.seed, 9);
    }
}
