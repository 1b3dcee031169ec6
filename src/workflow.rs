//! Workflow catalogue: the `*.json` files bundled with the web UI.

use std::path::{Path, PathBuf};

use crate::error::IoError;

/// Name of the workflow folder inside the UI build directory.
pub const WORKFLOW_DIR: &str = "workflow";

/// Lists workflow names from a directory of JSON files.
#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    dir: PathBuf,
}

impl WorkflowCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Catalogue for `<dist>/workflow`.
    pub fn in_dist(dist_dir: &Path) -> Self {
        Self::new(dist_dir.join(WORKFLOW_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Workflow names (file stems), sorted.
    ///
    /// A missing directory is an empty catalogue, not an error.
    pub async fn list(&self) -> Result<Vec<String>, IoError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IoError::read(&self.dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| IoError::read(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}
