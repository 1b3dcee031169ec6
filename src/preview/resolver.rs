//! Request resolution: storage classes, configured roots and path mapping.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PreviewError};

use super::naming::artifact_name;

// =============================================================================
// Storage Class
// =============================================================================

/// Logical bucket selecting the base directory of a source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    /// Intermediate images; also home of every derived artifact
    Temp,
    /// Final renders
    Output,
}

impl StorageClass {
    /// Map the `type` query value to a storage class.
    ///
    /// Only `"temp"` selects [`StorageClass::Temp`]; every other value,
    /// including unknown ones, selects [`StorageClass::Output`].
    pub fn from_query(value: &str) -> Self {
        if value == "temp" {
            StorageClass::Temp
        } else {
            StorageClass::Output
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Temp => "temp",
            StorageClass::Output => "output",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Image Request
// =============================================================================

/// A logical image request: a filename within a storage class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub filename: String,
    pub storage_class: StorageClass,
}

impl ImageRequest {
    pub fn new(filename: impl Into<String>, storage_class: StorageClass) -> Self {
        Self {
            filename: filename.into(),
            storage_class,
        }
    }
}

// =============================================================================
// Storage Roots
// =============================================================================

/// Base directories per storage class, fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageRoots {
    pub temp: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl StorageRoots {
    pub fn new(temp: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        Self { temp, output }
    }

    /// Base directory for a storage class, if configured.
    pub fn base_dir(&self, storage_class: StorageClass) -> Option<&Path> {
        match storage_class {
            StorageClass::Temp => self.temp.as_deref(),
            StorageClass::Output => self.output.as_deref(),
        }
    }
}

// =============================================================================
// Path Resolver
// =============================================================================

/// Physical locations for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// The original asset, owned by the upstream engine
    pub source: PathBuf,

    /// The cached preview, always under the temp root
    pub derived: PathBuf,
}

/// Maps image requests onto the configured directories.
///
/// Pure path arithmetic: nothing here touches the filesystem.
#[derive(Debug, Clone)]
pub struct PathResolver {
    roots: StorageRoots,
}

impl PathResolver {
    pub fn new(roots: StorageRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    /// Resolve a request into its source and derived paths.
    ///
    /// # Errors
    ///
    /// - [`PreviewError::InvalidFilename`] if the filename is empty, absolute,
    ///   or contains anything other than plain path components
    /// - [`PreviewError::Configuration`] if the request's storage class has no
    ///   base directory, or if the temp directory (where artifacts live) is unset
    pub fn resolve(&self, request: &ImageRequest) -> Result<ResolvedPaths, PreviewError> {
        let relative = validate_filename(&request.filename)?;

        let base = self
            .roots
            .base_dir(request.storage_class)
            .ok_or(ConfigError::MissingFolder {
                storage_class: request.storage_class,
            })?;

        let temp = self
            .roots
            .base_dir(StorageClass::Temp)
            .ok_or(ConfigError::MissingFolder {
                storage_class: StorageClass::Temp,
            })?;

        Ok(ResolvedPaths {
            source: base.join(relative),
            derived: temp.join(artifact_name(&request.filename)),
        })
    }
}

/// Accept only relative paths made of normal components.
fn validate_filename(filename: &str) -> Result<&Path, PreviewError> {
    let invalid = || PreviewError::InvalidFilename {
        filename: filename.to_string(),
    };

    if filename.is_empty() || filename.contains('\0') {
        return Err(invalid());
    }

    let path = Path::new(filename);
    if !path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(invalid());
    }

    Ok(path)
}

// =============================================================================
// Tests
// =============================================================================
