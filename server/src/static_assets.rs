use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
};
use include_dir::{include_dir, Dir};
use mime_guess::from_path;

static STATIC_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Serve a file embedded from `server/static`
pub async fn serve_static_file(Path(path): Path<String>) -> impl IntoResponse {
    let Some(file) = STATIC_DIR.get_file(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mime_type = from_path(&path).first_or_octet_stream().to_string();

    (
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        file.contents().to_vec(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_the_client_script() {
        let response = serve_static_file(Path("imagic.js".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .contains("javascript"));
    }

    #[tokio::test]
    async fn unknown_files_are_404() {
        let response = serve_static_file(Path("missing.css".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
