//! JSON API routes under `/api`.
//!
//! Every failure here renders as `{"error": "...", "issues"?: [...]}`; see
//! [`JsonError`].

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::{ApiResult, JsonError, ServerError};
use crate::validation::{parse_id, Issue};

pub mod bookmarks;
pub mod collections;
pub mod feeds;
pub mod images;

/// `axum::Json`, but a bad body is a JSON 400 rather than a plain text rejection
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                info!(error = %rejection.body_text(), "Rejected request body");
                Err(json_rejection(&rejection).into_response())
            }
        }
    }
}

fn json_rejection(rejection: &JsonRejection) -> JsonError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            JsonError::bad_request("Expected a JSON request body")
        }
        _ => JsonError::bad_request("Invalid JSON body"),
    }
}

/// `?imageId=` as used by the delete endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIdQuery {
    pub image_id: Option<String>,
}

/// `{ "imageId": "..." }` bodies
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIdBody {
    #[serde(default)]
    pub image_id: Option<String>,
}

/// A required id from the client; missing or malformed is a 400 with an issue
pub(crate) fn require_id(path: &str, raw: Option<&str>) -> ApiResult<Uuid> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return JsonError::invalid(vec![Issue::new(path, "Required")]).fail();
    };

    match parse_id(path, raw) {
        Ok(id) => Ok(id),
        Err(issues) => JsonError::invalid(issues).fail(),
    }
}

/// Shorthand for a handler failing with a given JSON error
pub(crate) fn reject<T>(err: JsonError, report: impl Into<color_eyre::Report>) -> ApiResult<T> {
    Err(ServerError(report.into(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn missing_id_is_a_validation_issue() {
        let err = require_id("imageId", None).unwrap_err();
        assert_eq!(err.1.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.1.issues, vec![Issue::new("imageId", "Required")]);
    }

    #[test]
    fn malformed_id_is_a_validation_issue() {
        let err = require_id("imageId", Some("not-a-uuid")).unwrap_err();
        assert_eq!(err.1.issues, vec![Issue::new("imageId", "Invalid id")]);
    }

    #[test]
    fn valid_id_parses() {
        let id = Uuid::new_v4();
        assert_eq!(require_id("imageId", Some(&id.to_string())).unwrap(), id);
    }
}
