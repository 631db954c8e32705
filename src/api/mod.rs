//! Server module exposing the playground over HTTP
//!
//! Serves the browser UI shell and the conversation-transition endpoints.
//! The server is stateless beyond the environment API key read once at
//! startup: every request carries the client's transcript and hands back
//! the updated one (or a stream of its snapshots), so each browser tab owns
//! exactly one conversation.

mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::PlaygroundError;
use crate::imaging;

pub use types::{GenerateRequest, MessageRequest, TranscriptResponse, UploadResponse};

/// Largest accepted upload body; multiple camera photos fit comfortably.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Main server struct
pub struct Server {
    /// API key taken from the environment at startup; the UI field
    /// overrides it per request
    pub env_api_key: Option<String>,
}

/// Internal server state shared between request handlers
#[derive(Clone)]
pub struct ServerState {
    /// API key taken from the environment at startup
    pub(crate) env_api_key: Option<String>,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// # Arguments
    /// * `env_api_key` - Environment-provided credential, if any; its
    ///   absence is not fatal since the UI exposes a per-session key field
    pub fn new(env_api_key: Option<String>) -> Self {
        Self { env_api_key }
    }

    /// Starts the server and listens for requests on the specified address
    ///
    /// # Arguments
    /// * `addr` - Address to bind to (e.g. "127.0.0.1:7860")
    pub async fn run(self, addr: &str) -> Result<(), PlaygroundError> {
        let app = Router::new()
            .route("/", get(handlers::ui))
            .route("/api/message", post(handlers::handle_message))
            .route("/api/upload", post(handlers::handle_upload))
            .route("/api/generate", post(handlers::handle_generate))
            .nest_service("/images", ServeDir::new(imaging::cache_dir()))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(CorsLayer::permissive())
            .with_state(ServerState {
                env_api_key: self.env_api_key,
            });

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PlaygroundError::ConfigError(format!("failed to bind {}: {}", addr, e)))?;

        log::info!("playground listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| PlaygroundError::HttpError(e.to_string()))?;

        Ok(())
    }
}
