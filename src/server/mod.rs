//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      /api/get_image  /api/object_info  /api/workflows  /*       │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │         handlers         │  │           routes            │  │
//! │  │ (requests, error bodies) │  │ (router, middleware, static)│  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    comfyui_endpoint_handler, get_image_handler, object_info_handler, workflows_handler,
    AppState, EndpointResponse, ErrorResponse, ImageQueryParams, PREVIEW_CACHE_HEADER,
    PREVIEW_CONTENT_TYPE,
};
pub use routes::{create_router, RouterConfig};
