//! Preview service orchestrating the derived-artifact cache.
//!
//! # Request Flow
//!
//! ```text
//!   ImageRequest
//!        │
//!        ▼
//!   PathResolver ──── invalid / unconfigured ──► PreviewError
//!        │
//!        ▼
//!   source exists? ── no ──────────────────────► PreviewError::SourceNotFound
//!        │ yes
//!        ▼
//!   inside base? ──── no (symlink escape) ─────► PreviewError::InvalidFilename
//!        │ yes
//!        ▼
//!   derived exists? ─ yes ─► read derived ─────► PreviewOutcome::CacheHit
//!        │ no
//!        ▼
//!   ensure_artifact (one transcode per derived path)
//!        │
//!        ├─ ok ──────────► read derived ───────► PreviewOutcome::Transcoded
//!        └─ failed ──────► open source ────────► PreviewOutcome::Fallback
//! ```
//!
//! Concurrent misses for the same derived path are collapsed: the first
//! request spawns the transcode as a detached task and registers a completion
//! channel; later requests subscribe to it. The task runs to completion even
//! if every waiting request is dropped, so the artifact still lands in the
//! cache for the next caller.
//!
//! Decoding runs without pixel limits, so the number of transcodes running at
//! once across all paths is capped by a semaphore. Misses beyond the cap wait
//! for a permit before they reach the blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, PreviewError, TranscodeError};

use super::resolver::{ImageRequest, PathResolver, ResolvedPaths, StorageRoots};
use super::transcoder::{clamp_quality, JpegTranscoder, Transcoder, DEFAULT_QUALITY};

/// Default number of transcodes allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_TRANSCODES: usize = 4;

// =============================================================================
// Preview Response
// =============================================================================

/// Which representation was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// Derived artifact already existed
    CacheHit,
    /// Derived artifact was produced for this request (or a concurrent one)
    Transcoded,
    /// Transcoding failed; the original bytes are served instead
    Fallback,
}

impl PreviewOutcome {
    /// Value of the `X-Preview-Cache` response header.
    pub fn as_header_value(&self) -> &'static str {
        match self {
            PreviewOutcome::CacheHit => "hit",
            PreviewOutcome::Transcoded => "miss",
            PreviewOutcome::Fallback => "fallback",
        }
    }
}

/// Payload of a preview response.
///
/// Previews are small and read whole. Originals can be hundreds of megabytes,
/// so the fallback hands out an open file to be streamed.
#[derive(Debug)]
pub enum PreviewBody {
    /// Derived artifact, read into memory
    Bytes(Bytes),

    /// Original source file, opened for streaming
    File { file: tokio::fs::File, len: u64 },
}

impl PreviewBody {
    /// In-memory bytes, or `None` for a streamed file.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PreviewBody::Bytes(bytes) => Some(bytes),
            PreviewBody::File { .. } => None,
        }
    }

    /// Number of bytes the client will receive.
    pub fn len(&self) -> u64 {
        match self {
            PreviewBody::Bytes(bytes) => bytes.len() as u64,
            PreviewBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response from the preview service.
#[derive(Debug)]
pub struct PreviewResponse {
    /// What to send to the client
    pub body: PreviewBody,

    /// How the body was obtained
    pub outcome: PreviewOutcome,

    /// File the body comes from
    pub path: PathBuf,
}

// =============================================================================
// Preview Service
// =============================================================================

type TranscodeResult = Result<(), TranscodeError>;

/// Completion slot for one in-flight transcode; `None` until it finishes.
type InFlight = watch::Receiver<Option<TranscodeResult>>;

/// Service resolving image requests to the best available bytes.
///
/// # Type Parameters
///
/// * `T` - The transcoder producing derived artifacts
///
/// # Example
///
/// ```ignore
/// use comfy_frontend::preview::{ImageRequest, PreviewService, StorageClass, StorageRoots};
///
/// let roots = StorageRoots::new(Some("/comfy/temp".into()), Some("/comfy/output".into()));
/// let service = PreviewService::new(roots).with_max_concurrent_transcodes(2);
///
/// let request = ImageRequest::new("ComfyUI_00001_.png", StorageClass::Output);
/// let response = service.get_preview(&request).await?;
/// println!("{} bytes ({:?})", response.body.len(), response.outcome);
/// ```
pub struct PreviewService<T: Transcoder = JpegTranscoder> {
    /// Maps requests to source and derived paths
    resolver: PathResolver,

    /// Produces derived artifacts on cache misses
    transcoder: Arc<T>,

    /// Quality passed to every transcode
    quality: u8,

    /// Transcodes currently running, keyed by derived path
    in_flight: Arc<Mutex<HashMap<PathBuf, InFlight>>>,

    /// Caps transcodes running at once across all derived paths
    transcode_permits: Arc<Semaphore>,

    /// Size of `transcode_permits`
    max_concurrent_transcodes: usize,
}

impl PreviewService<JpegTranscoder> {
    /// Create a service with the JPEG transcoder at the default quality.
    pub fn new(roots: StorageRoots) -> Self {
        Self::with_transcoder(roots, JpegTranscoder::new(), DEFAULT_QUALITY)
    }

    /// Create a service with the JPEG transcoder at a custom quality.
    pub fn with_quality(roots: StorageRoots, quality: u8) -> Self {
        Self::with_transcoder(roots, JpegTranscoder::new(), quality)
    }
}

impl<T: Transcoder> PreviewService<T> {
    /// Create a service with a custom transcoder.
    ///
    /// Quality is clamped to 1-100.
    pub fn with_transcoder(roots: StorageRoots, transcoder: T, quality: u8) -> Self {
        Self {
            resolver: PathResolver::new(roots),
            transcoder: Arc::new(transcoder),
            quality: clamp_quality(quality),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            transcode_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_TRANSCODES)),
            max_concurrent_transcodes: DEFAULT_MAX_CONCURRENT_TRANSCODES,
        }
    }

    /// Set how many transcodes may run at once (at least 1).
    pub fn with_max_concurrent_transcodes(mut self, max: usize) -> Self {
        let max = max.max(1);
        self.transcode_permits = Arc::new(Semaphore::new(max));
        self.max_concurrent_transcodes = max;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn max_concurrent_transcodes(&self) -> usize {
        self.max_concurrent_transcodes
    }

    /// Serve a preview, producing the derived artifact on first request.
    ///
    /// # Errors
    ///
    /// - [`PreviewError::InvalidFilename`] / [`PreviewError::Configuration`]
    ///   from path resolution
    /// - [`PreviewError::SourceNotFound`] if the original is absent; no
    ///   transcode is attempted
    /// - [`PreviewError::InvalidFilename`] if the original is a symlink
    ///   leading outside its storage folder
    /// - [`PreviewError::Internal`] if transcoding failed and the original
    ///   could not be opened either
    pub async fn get_preview(&self, request: &ImageRequest) -> Result<PreviewResponse, PreviewError> {
        let ResolvedPaths { source, derived } = self.resolver.resolve(request)?;

        if !is_file(&source).await {
            return Err(PreviewError::SourceNotFound {
                path: source.display().to_string(),
            });
        }
        self.check_contained(request, &source).await?;

        // Cache hit
        match tokio::fs::read(&derived).await {
            Ok(data) => {
                debug!(derived = %derived.display(), "Preview cache hit");
                return Ok(PreviewResponse {
                    body: PreviewBody::Bytes(Bytes::from(data)),
                    outcome: PreviewOutcome::CacheHit,
                    path: derived,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    derived = %derived.display(),
                    error = %e,
                    "Failed to read cached preview; regenerating"
                );
            }
        }

        // Cache miss
        match self.ensure_artifact(&source, &derived).await {
            Ok(()) => match tokio::fs::read(&derived).await {
                Ok(data) => {
                    return Ok(PreviewResponse {
                        body: PreviewBody::Bytes(Bytes::from(data)),
                        outcome: PreviewOutcome::Transcoded,
                        path: derived,
                    })
                }
                Err(e) => {
                    warn!(
                        derived = %derived.display(),
                        error = %e,
                        "Preview was written but could not be read back"
                    );
                }
            },
            Err(e) => {
                warn!(
                    source = %source.display(),
                    error = %e,
                    "Transcode failed; serving original"
                );
            }
        }

        // Fallback to the untouched original
        let internal = |e: std::io::Error| PreviewError::Internal {
            message: format!("failed to open {}: {}", source.display(), e),
        };
        let file = tokio::fs::File::open(&source).await.map_err(internal)?;
        let len = file.metadata().await.map_err(internal)?.len();

        Ok(PreviewResponse {
            body: PreviewBody::File { file, len },
            outcome: PreviewOutcome::Fallback,
            path: source,
        })
    }

    /// Make sure the derived artifact exists, transcoding at most once
    /// concurrently per derived path.
    pub async fn ensure_artifact(&self, source: &Path, derived: &Path) -> TranscodeResult {
        let mut receiver = {
            let mut in_flight = self.in_flight.lock().await;

            match in_flight.get(derived) {
                Some(receiver) => {
                    debug!(derived = %derived.display(), "Joining in-flight transcode");
                    receiver.clone()
                }
                None => {
                    let (sender, receiver) = watch::channel(None);
                    in_flight.insert(derived.to_path_buf(), receiver.clone());
                    drop(in_flight);

                    self.spawn_transcode(source.to_path_buf(), derived.to_path_buf(), sender);
                    receiver
                }
            }
        };

        let result = receiver.wait_for(Option::is_some).await;
        match result {
            Ok(slot) => slot
                .as_ref()
                .cloned()
                .unwrap_or_else(|| Err(TranscodeError::Interrupted("no result".to_string()))),
            Err(_) => Err(TranscodeError::Interrupted(
                "transcode task ended without a result".to_string(),
            )),
        }
    }

    /// Number of transcodes currently running.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Reject sources whose real location is outside their storage folder.
    async fn check_contained(
        &self,
        request: &ImageRequest,
        source: &Path,
    ) -> Result<(), PreviewError> {
        let Some(base) = self.resolver.roots().base_dir(request.storage_class) else {
            return Err(PreviewError::Configuration(ConfigError::MissingFolder {
                storage_class: request.storage_class,
            }));
        };

        let not_found = || PreviewError::SourceNotFound {
            path: source.display().to_string(),
        };
        let base = tokio::fs::canonicalize(base).await.map_err(|_| not_found())?;
        let real = tokio::fs::canonicalize(source)
            .await
            .map_err(|_| not_found())?;

        if real.starts_with(&base) {
            Ok(())
        } else {
            warn!(
                filename = %request.filename,
                storage_class = %request.storage_class,
                target = %real.display(),
                "Source resolves outside its storage folder"
            );
            Err(PreviewError::InvalidFilename {
                filename: request.filename.clone(),
            })
        }
    }

    /// Run the transcode on the blocking pool inside a detached task.
    ///
    /// The task waits for a transcode permit first; the permit is held until
    /// the blocking job returns.
    fn spawn_transcode(
        &self,
        source: PathBuf,
        derived: PathBuf,
        sender: watch::Sender<Option<TranscodeResult>>,
    ) {
        let transcoder = Arc::clone(&self.transcoder);
        let in_flight = Arc::clone(&self.in_flight);
        let permits = Arc::clone(&self.transcode_permits);
        let quality = self.quality;

        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(permit) => {
                    let started_at = Instant::now();
                    let job_derived = derived.clone();

                    let joined = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        // A previous leader may have finished between our
                        // existence check and registering in the in-flight map.
                        if job_derived.is_file() {
                            return Ok(false);
                        }
                        transcoder
                            .transcode(&source, &job_derived, quality)
                            .map(|()| true)
                    })
                    .await;

                    match joined {
                        Ok(Ok(true)) => {
                            info!(
                                derived = %derived.display(),
                                quality,
                                elapsed_ms = started_at.elapsed().as_millis() as u64,
                                "Preview generated"
                            );
                            Ok(())
                        }
                        Ok(Ok(false)) => Ok(()),
                        Ok(Err(e)) => Err(e),
                        Err(join_err) => Err(TranscodeError::Interrupted(join_err.to_string())),
                    }
                }
                Err(_) => Err(TranscodeError::Interrupted(
                    "transcode limiter closed".to_string(),
                )),
            };

            in_flight.lock().await.remove(&derived);
            let _ = sender.send(Some(result));
        });
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
