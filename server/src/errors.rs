use std::fmt::Debug;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use color_eyre::eyre::eyre;
use serde_json::json;

use crate::validation::Issue;

#[derive(Debug)]
pub struct ServerError<R: IntoResponse>(pub(crate) color_eyre::Report, pub(crate) R);

pub type ServerResult<S, F = Response> = Result<S, ServerError<F>>;

/// Result type for the JSON API routes
pub type ApiResult<S> = ServerResult<S, JsonError>;

impl<R: IntoResponse> IntoResponse for ServerError<R> {
    fn into_response(self) -> axum::response::Response {
        let response = self.1.into_response();

        if response.status().is_server_error() {
            tracing::error!(error = ?self.0, "Request Error");
        } else {
            tracing::info!(status = %response.status(), error = %self.0, "Request rejected");
        }

        let is_dev_mode = std::env::var("DEVELOPMENT_MODE")
            .map(|v| v == "1")
            .unwrap_or(false);

        if is_dev_mode && response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            let error_text = format!("{:?}", self.0)
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;")
                .replace('\'', "&#39;");

            let error_html = format!(
                r#"<!DOCTYPE html>
<html>
<head>
    <title>Development Error - 500</title>
    <style>
        body {{ font-family: monospace; margin: 20px; background: #1a1a1a; color: #fff; }}
        .error-container {{ background: #2d2d2d; padding: 20px; border-radius: 8px; }}
        .error-title {{ color: #ff6b6b; font-size: 24px; margin-bottom: 20px; }}
        .error-details {{ background: #000; padding: 15px; border-radius: 4px; overflow-x: auto; }}
        pre {{ margin: 0; white-space: pre-wrap; word-wrap: break-word; }}
    </style>
</head>
<body>
    <div class="error-container">
        <div class="error-title">Development Mode - Internal Server Error</div>
        <div class="error-details">
            <pre>{}</pre>
        </div>
    </div>
</body>
</html>"#,
                error_text
            );

            return (StatusCode::INTERNAL_SERVER_ERROR, Html(error_html)).into_response();
        }

        response
    }
}

impl<E> From<E> for ServerError<StatusCode>
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        ServerError(err.into(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl<E> From<E> for ServerError<JsonError>
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        ServerError(err.into(), JsonError::internal("Internal server error"))
    }
}

/// JSON error body returned by the API routes: `{"error": "...", "issues": [...]}`
#[derive(Debug, Clone, PartialEq)]
pub struct JsonError {
    pub status: StatusCode,
    pub message: String,
    pub issues: Vec<Issue>,
}

impl JsonError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn invalid(issues: Vec<Issue>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request".to_string(),
            issues,
        }
    }

    /// Turn this into an error result, using the message as the report
    pub fn fail<T>(self) -> ApiResult<T> {
        Err(ServerError(eyre!("{}", self.message), self))
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let body = if self.issues.is_empty() {
            json!({ "error": self.message })
        } else {
            json!({ "error": self.message, "issues": self.issues })
        };

        (self.status, Json(body)).into_response()
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError<StatusCode>>;
}

impl<T> WithStatus<T> for Result<T, color_eyre::Report> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError<StatusCode>> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(ServerError(err, status)),
        }
    }
}

pub(crate) trait WithRedirect<T> {
    fn with_redirect(self, redirect: Redirect) -> Result<T, ServerError<Redirect>>;
}

impl<T> WithRedirect<T> for Result<T, color_eyre::Report> {
    fn with_redirect(self, redirect: Redirect) -> Result<T, ServerError<Redirect>> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(ServerError(err, redirect)),
        }
    }
}

pub(crate) trait WithJsonError<T> {
    /// Map a failure to a JSON error with the given status and public message
    fn with_json_error(self, status: StatusCode, message: &str) -> ApiResult<T>;
}

impl<T> WithJsonError<T> for Result<T, color_eyre::Report> {
    fn with_json_error(self, status: StatusCode, message: &str) -> ApiResult<T> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(ServerError(err, JsonError::new(status, message))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn json_error_renders_message_without_issues() {
        let response = JsonError::not_found("Image not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "Image not found" }));
    }

    #[tokio::test]
    async fn json_error_includes_issues_when_present() {
        let response = JsonError::invalid(vec![Issue::new("prompt", "Prompt is too long")])
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid request");
        assert_eq!(body["issues"][0]["path"], "prompt");
    }

    #[tokio::test]
    async fn with_json_error_keeps_the_public_message() {
        let result: Result<(), color_eyre::Report> = Err(eyre!("connection refused"));
        let err = result
            .with_json_error(StatusCode::BAD_GATEWAY, "Failed to generate image")
            .unwrap_err();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"], "Failed to generate image");
    }
}
