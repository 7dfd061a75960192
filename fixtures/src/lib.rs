//! In-memory stand-ins for the services Imagic talks to.
//!
//! Each module exposes a fixture handle plus a `router`, so a fixture can run
//! as a standalone binary (see `src/bin`) or inside a test via [`spawn`].

use axum::Router;
use clap::Parser;
use std::env;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod identity;
pub mod image_model;
pub mod payments;
pub mod storage;

/// Common CLI arguments for all fixture servers
#[derive(Parser, Debug, Clone)]
pub struct FixtureArgs {
    /// The port to listen on
    #[arg(short, long, default_value = "0")]
    pub port: u16,

    /// The host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Force allow running without required environment variables (for development)
    #[arg(long)]
    pub force: bool,
}

/// Helper to get a required environment variable or return an error
pub fn require_env_var(name: &str, force: bool) -> anyhow::Result<String> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => {
            if force {
                error!("WARNING: Required environment variable {} not set. Using placeholder value because --force was specified.", name);
                Ok("http://localhost:3000".to_string())
            } else {
                anyhow::bail!(
                    "Required environment variable {} not set. Use --force to bypass this check.",
                    name
                )
            }
        }
    }
}

/// Common function to run a fixture server
pub async fn run_server(args: FixtureArgs, app: Router) -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let addr = format!("{}:{}", args.host, args.port).parse::<SocketAddr>()?;

    let app = app.layer(TraceLayer::new_for_http());

    info!("Fixture server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// A fixture served on an ephemeral local port for the life of a test
pub struct Spawned {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for Spawned {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind to `127.0.0.1:0` and serve `app` in the background
pub async fn spawn(app: Router) -> anyhow::Result<Spawned> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!("Fixture server stopped: {err}");
        }
    });

    Ok(Spawned { base_url, handle })
}

/// `{"error": {"message": ...}}`, the error shape the image and payments APIs share
pub(crate) fn api_error(
    status: axum::http::StatusCode,
    message: &str,
) -> (axum::http::StatusCode, axum::Json<serde_json::Value>) {
    (
        status,
        axum::Json(serde_json::json!({ "error": { "message": message } })),
    )
}

/// Whether the request carries some bearer token
pub(crate) fn has_bearer(headers: &axum::http::HeaderMap) -> bool {
    bearer(headers).is_some()
}

pub(crate) fn bearer(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
