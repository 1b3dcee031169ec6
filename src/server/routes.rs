//! Router configuration for the front-end server.
//!
//! # Route Structure
//!
//! ```text
//! /api/get_image          - Image preview (cached JPEG or original)
//! /api/object_info        - Upstream node catalogue relay
//! /api/workflows          - Workflow names
//! /api/comfyui_endpoint   - Configured upstream endpoint
//! /*                      - Static web UI from the dist directory
//! ```
//!
//! # Example
//!
//! ```ignore
//! use comfy_frontend::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(preview_service, upstream, workflows);
//! let router = create_router(state, RouterConfig::new("dist"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::any::Any;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use super::handlers::{
    comfyui_endpoint_handler, get_image_handler, object_info_handler, workflows_handler,
    AppState, ErrorResponse,
};
use crate::preview::Transcoder;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Directory of the built web UI
    pub dist_dir: PathBuf,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to gzip responses
    pub enable_compression: bool,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration serving the UI from `dist_dir`.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Compression is enabled
    /// - Tracing is enabled
    pub fn new(dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            dist_dir: dist_dir.into(),
            cors_origins: None,
            enable_compression: true,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable gzip compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - API routes under `/api`
/// - Static file fallback for the web UI
/// - Panic recovery, CORS, optional compression and tracing
pub fn create_router<T: Transcoder>(state: AppState<T>, config: RouterConfig) -> Router {
    let api_routes = Router::new()
        .route("/get_image", get(get_image_handler::<T>))
        .route("/object_info", get(object_info_handler::<T>))
        .route("/workflows", get(workflows_handler::<T>))
        .route("/comfyui_endpoint", get(comfyui_endpoint_handler::<T>))
        .with_state(state);

    let static_files = ServeDir::new(&config.dist_dir).append_index_html_on_directories(true);

    let router = Router::new()
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(build_cors_layer(&config));

    let router = if config.enable_compression {
        router.layer(CompressionLayer::new().gzip(true))
    } else {
        router
    };

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Turn a handler panic into a JSON 500 instead of dropping the connection.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(status = 500, "Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(AnyOrigin),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
