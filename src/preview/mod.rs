//! Image preview layer.
//!
//! This module turns `(filename, storage class)` requests into image bytes,
//! caching a compressed derivative of each original on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             PreviewService              │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ PathResolver │  │   Transcoder    │  │
//! │  │ (+ artifact  │  │  (decode →      │  │
//! │  │    naming)   │  │  flatten → JPEG)│  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   temp/ and output/ folders on disk     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PreviewService`]: Cache orchestration, fallback and in-flight collapsing
//! - [`PathResolver`]: Maps requests onto [`StorageRoots`]
//! - [`artifact_name`]: Deterministic derived-artifact filename
//! - [`Transcoder`] / [`JpegTranscoder`]: Produces the derived artifact
//!
//! At most [`DEFAULT_MAX_CONCURRENT_TRANSCODES`] decodes run at once unless
//! configured otherwise; each holds a full-size image in memory.
//!
//! Derived artifacts are never evicted. The temp folder grows with every
//! distinct filename previewed; pruning it is left to the operator.

mod naming;
mod resolver;
mod service;
mod transcoder;

pub use naming::{artifact_name, ARTIFACT_MARKER};
pub use resolver::{ImageRequest, PathResolver, ResolvedPaths, StorageClass, StorageRoots};
pub use service::{
    PreviewBody, PreviewOutcome, PreviewResponse, PreviewService,
    DEFAULT_MAX_CONCURRENT_TRANSCODES,
};
pub use transcoder::{
    clamp_quality, flatten_onto_white, is_valid_quality, JpegTranscoder, Transcoder,
    DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};
