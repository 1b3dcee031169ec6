use thiserror::Error;

use crate::preview::StorageClass;

/// Errors raised while resolving a request against the configured folders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No base directory is configured for the storage class
    #[error("Folder configuration not found for type: {storage_class}")]
    MissingFolder { storage_class: StorageClass },
}

/// Errors that can occur while producing a derived artifact.
///
/// The messages are stored as strings so the error can be cloned and handed
/// to every request waiting on the same transcode.
#[derive(Debug, Clone, Error)]
pub enum TranscodeError {
    /// Source file could not be opened or read
    #[error("Failed to read source {path}: {message}")]
    Read { path: String, message: String },

    /// Source bytes are not a decodable raster image
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    /// Encoder rejected the normalized pixels
    #[error("Failed to encode preview: {message}")]
    Encode { message: String },

    /// Destination could not be created, written or renamed into place
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    /// The transcode worker stopped before reporting a result
    #[error("Transcode interrupted: {0}")]
    Interrupted(String),
}

/// Errors surfaced by the preview pipeline to the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    /// Filename is empty, absolute, or escapes the base directory
    #[error("Invalid filename: {filename}")]
    InvalidFilename { filename: String },

    /// Required base directory is not configured
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Source asset does not exist
    #[error("Image not found: {path}")]
    SourceNotFound { path: String },

    /// Neither the derived artifact nor the original could be served
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors from the upstream metadata relay.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Configured endpoint is not a usable base URL
    #[error("Invalid upstream endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// Upstream did not answer within the configured timeout
    #[error("Upstream request timed out: {0}")]
    Timeout(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// Upstream body is not valid JSON
    #[error("Invalid upstream body: {0}")]
    InvalidBody(String),
}

/// I/O errors outside the preview pipeline (directory listings, reads).
#[derive(Debug, Clone, Error)]
pub enum IoError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
}

impl IoError {
    pub(crate) fn read(path: &std::path::Path, err: std::io::Error) -> Self {
        IoError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
