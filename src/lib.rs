//! # ComfyUI Front-end
//!
//! A local HTTP front-end for the ComfyUI image generation engine.
//!
//! The server hosts the prebuilt web UI, relays the node catalogue from the
//! upstream engine and serves previews of generated images. Generated images
//! can be very large, so the first request for each one produces a compressed,
//! alpha-flattened JPEG next to the other temp images and every later request
//! is served from that file.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`preview`] - Path resolution, artifact naming, transcoding and the preview cache
//! - [`upstream`] - Relay client for the upstream engine
//! - [`workflow`] - Workflow catalogue listing
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and application config types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use comfy_frontend::{
//!     create_router, AppState, PreviewService, RouterConfig, StorageRoots, UpstreamClient,
//!     WorkflowCatalog,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let roots = StorageRoots::new(
//!         Some("/comfy/temp".into()),
//!         Some("/comfy/output".into()),
//!     );
//!     let upstream = UpstreamClient::new("http://127.0.0.1:8188", Duration::from_secs(30))
//!         .expect("valid endpoint");
//!
//!     let state = AppState::new(
//!         PreviewService::new(roots),
//!         upstream,
//!         WorkflowCatalog::in_dist("dist".as_ref()),
//!     );
//!     let router = create_router(state, RouterConfig::new("dist"));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod preview;
pub mod server;
pub mod upstream;
pub mod workflow;

// Re-export commonly used types
pub use config::{AppConfig, CheckConfig, Cli, Command, ConfigSource, LoadedConfig, ServeConfig};
pub use error::{ConfigError, IoError, PreviewError, TranscodeError, UpstreamError};
pub use preview::{
    artifact_name, ImageRequest, JpegTranscoder, PathResolver, PreviewBody, PreviewOutcome,
    PreviewResponse, PreviewService, ResolvedPaths, StorageClass, StorageRoots, Transcoder, DEFAULT_QUALITY,
};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use upstream::UpstreamClient;
pub use workflow::WorkflowCatalog;
