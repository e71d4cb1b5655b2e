//! Voxgate server library logic.

pub mod api;
pub mod api_history;
pub mod api_tts;
pub mod config;
pub mod delivery;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use voxgate_db::DbPool;
use voxgate_voice::SynthesisService;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Staging, invocation and output handling.
    pub synthesis: Arc<SynthesisService>,
    /// History database pool, present only when history is enabled.
    pub history: Option<DbPool>,
    /// Built web client to serve as the fallback, if any.
    pub client_dir: Option<PathBuf>,
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Body limit for the clone routes: a 10 MiB clip plus base64 overhead.
const MAX_CLONE_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let clone_routes = Router::new()
        .route("/api/tts/clone", post(api_tts::clone_handler))
        .route("/api/tts/clone/json", post(api_tts::clone_json_handler))
        .layer(DefaultBodyLimit::max(MAX_CLONE_BODY_BYTES));

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/tts/simple", post(api_tts::simple_handler))
        .route("/api/history", get(api_history::list_history_handler))
        .merge(clone_routes);

    let router = match &state.client_dir {
        Some(client_dir) if client_dir.join("index.html").exists() => {
            if !client_dir.is_absolute() {
                tracing::warn!(
                    path = %client_dir.display(),
                    "client_dir is relative; static file serving depends on working directory"
                );
            }
            tracing::info!(path = %client_dir.display(), "serving client static files");
            router.fallback_service(
                ServeDir::new(client_dir).fallback(ServeFile::new(client_dir.join("index.html"))),
            )
        }
        Some(client_dir) => {
            tracing::info!(
                path = %client_dir.display(),
                "client directory not found, skipping static file serving"
            );
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
