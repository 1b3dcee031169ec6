//! HTTP request handlers for the front-end API.
//!
//! # Endpoints
//!
//! - `GET /api/get_image?filename=<name>&type=<temp|output>` - Serve an image preview
//! - `GET /api/object_info` - Relay the upstream node catalogue
//! - `GET /api/workflows` - List bundled workflows
//! - `GET /api/comfyui_endpoint` - Report the configured upstream endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::error::{IoError, PreviewError, UpstreamError};
use crate::preview::{ImageRequest, PreviewBody, PreviewService, StorageClass, Transcoder};
use crate::upstream::UpstreamClient;
use crate::workflow::WorkflowCatalog;

/// Content type of every image response, fallback included.
pub const PREVIEW_CONTENT_TYPE: &str = "image/jpeg";

/// Header reporting how an image response was produced.
pub const PREVIEW_CACHE_HEADER: HeaderName = HeaderName::from_static("x-preview-cache");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// Built once at startup from the loaded configuration and passed to all
/// handlers via Axum's State extractor.
pub struct AppState<T: Transcoder> {
    /// Preview pipeline for `/api/get_image`
    pub preview: Arc<PreviewService<T>>,

    /// Upstream relay for `/api/object_info`
    pub upstream: Arc<UpstreamClient>,

    /// Workflow listing for `/api/workflows`
    pub workflows: Arc<WorkflowCatalog>,
}

impl<T: Transcoder> AppState<T> {
    pub fn new(
        preview: PreviewService<T>,
        upstream: UpstreamClient,
        workflows: WorkflowCatalog,
    ) -> Self {
        Self {
            preview: Arc::new(preview),
            upstream: Arc::new(upstream),
            workflows: Arc::new(workflows),
        }
    }
}

impl<T: Transcoder> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            preview: Arc::clone(&self.preview),
            upstream: Arc::clone(&self.upstream),
            workflows: Arc::clone(&self.workflows),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for image requests.
#[derive(Debug, Deserialize)]
pub struct ImageQueryParams {
    /// Image filename relative to the storage class folder
    pub filename: String,

    /// Storage class; `"temp"` or anything else for output
    #[serde(rename = "type")]
    pub storage_type: String,
}

impl ImageQueryParams {
    pub fn to_request(&self) -> ImageRequest {
        ImageRequest::new(
            self.filename.clone(),
            StorageClass::from_query(&self.storage_type),
        )
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body returned for API failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Response from the endpoint query.
#[derive(Debug, Serialize)]
pub struct EndpointResponse {
    pub endpoint: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert PreviewError to HTTP response.
///
/// - 4xx errors are logged at DEBUG (404) or WARN level
/// - 5xx errors are logged at ERROR level
impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        match &self {
            PreviewError::SourceNotFound { path } => {
                debug!(status = 404, path = %path, "Image not found");
                (StatusCode::NOT_FOUND, "Image not found").into_response()
            }

            PreviewError::InvalidFilename { filename } => {
                warn!(status = 400, filename = %filename, "Rejected image filename");
                let body = ErrorResponse::new(self.to_string());
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }

            PreviewError::Configuration(config_err) => {
                error!(status = 500, "Server error: {}", config_err);
                let body = ErrorResponse::new(config_err.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }

            PreviewError::Internal { message } => {
                error!(status = 500, "Server error: {}", message);
                let body = ErrorResponse::new("Failed to get image");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

/// Convert UpstreamError to HTTP response.
///
/// Every upstream failure is reported the same way to the UI; the cause
/// only goes to the log.
impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        error!(status = 500, "Error getting object info: {}", self);
        let body = ErrorResponse::new("Failed to get object info");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Convert workflow listing errors to HTTP response.
impl IntoResponse for IoError {
    fn into_response(self) -> Response {
        error!(status = 500, "Error getting workflow list: {}", self);
        let body = ErrorResponse::new("Failed to get workflow list");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image preview requests.
///
/// # Endpoint
///
/// `GET /api/get_image?filename=<name>&type=<temp|output>`
///
/// # Response
///
/// - `200 OK`: preview bytes, or the original bytes if transcoding failed
/// - `400 Bad Request`: filename escapes the storage folder
/// - `404 Not Found`: source image does not exist (plain text)
/// - `500 Internal Server Error`: folder not configured, or nothing readable
///
/// # Headers
///
/// - `Content-Type: image/jpeg` (also on the fallback path, whatever the
///   original's encoding)
/// - `Content-Length`; fallback originals are streamed from disk
/// - `X-Preview-Cache: hit|miss|fallback`
pub async fn get_image_handler<T: Transcoder>(
    State(state): State<AppState<T>>,
    Query(query): Query<ImageQueryParams>,
) -> Result<Response, PreviewError> {
    let request = query.to_request();
    let response = state.preview.get_preview(&request).await?;

    let content_length = response.body.len().to_string();
    let body = match response.body {
        PreviewBody::Bytes(bytes) => Body::from(bytes),
        PreviewBody::File { file, .. } => Body::from_stream(ReaderStream::new(file)),
    };

    Ok((
        [
            (header::CONTENT_TYPE, PREVIEW_CONTENT_TYPE.to_string()),
            (header::CONTENT_LENGTH, content_length),
            (
                PREVIEW_CACHE_HEADER,
                response.outcome.as_header_value().to_string(),
            ),
        ],
        body,
    )
        .into_response())
}

/// Handle node catalogue requests by relaying them upstream.
///
/// # Endpoint
///
/// `GET /api/object_info`
///
/// # Response
///
/// - `200 OK`: upstream JSON body, unchanged
/// - `500 Internal Server Error`: `{"error": "Failed to get object info"}`
pub async fn object_info_handler<T: Transcoder>(
    State(state): State<AppState<T>>,
) -> Result<Response, UpstreamError> {
    let body = state.upstream.object_info().await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Handle workflow list requests.
///
/// # Endpoint
///
/// `GET /api/workflows`
///
/// # Response
///
/// `200 OK` with a JSON array of workflow names:
/// ```json
/// ["img2img", "txt2img"]
/// ```
pub async fn workflows_handler<T: Transcoder>(
    State(state): State<AppState<T>>,
) -> Result<Json<Vec<String>>, IoError> {
    let workflows = state.workflows.list().await?;
    Ok(Json(workflows))
}

/// Handle upstream endpoint queries.
///
/// # Endpoint
///
/// `GET /api/comfyui_endpoint`
///
/// # Response
///
/// ```json
/// { "endpoint": "http://127.0.0.1:8188" }
/// ```
pub async fn comfyui_endpoint_handler<T: Transcoder>(
    State(state): State<AppState<T>>,
) -> Json<EndpointResponse> {
    Json(EndpointResponse {
        endpoint: state.upstream.endpoint().to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
