//! Configuration management for the ComfyUI front-end.
//!
//! Configuration comes from two places:
//! - Command-line arguments via clap (every flag also reads a `COMFY_`
//!   environment variable) controlling the process itself
//! - A JSON application config (`config.json`) shared with the web UI tooling,
//!   holding the listen port, the upstream endpoint and the image folders
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use comfy_frontend::config::{AppConfig, Cli, Command};
//!
//! let cli = Cli::parse();
//! if let Command::Serve(serve) = cli.into_command() {
//!     let loaded = AppConfig::load(&serve.config, &serve.config_template);
//!     println!("Listening on {}", serve.bind_address(&loaded.config));
//! }
//! ```
//!
//! # Application Config Keys
//!
//! - `bun_port` - Listen port (default: 3000)
//! - `comfyui_endpoint` - Upstream ComfyUI base URL (default: http://127.0.0.1:8188)
//! - `comfyui_temp_folder` - Folder of `temp` images; also holds cached previews
//! - `comfyui_output_folder` - Folder of `output` images
//!
//! # Environment Variables
//!
//! - `COMFY_CONFIG` - Path of the JSON config (default: config.json)
//! - `COMFY_CONFIG_TEMPLATE` - Template copied into place when the config is missing
//! - `COMFY_DIST` - Directory of the built web UI (default: dist)
//! - `COMFY_HOST` - Server bind address (default: 0.0.0.0)
//! - `COMFY_PORT` - Overrides `bun_port`
//! - `COMFY_QUALITY` - Preview JPEG quality (default: 85)
//! - `COMFY_MAX_CONCURRENT_TRANSCODES` - Transcodes allowed at once (default: 4)
//! - `COMFY_UPSTREAM_TIMEOUT` - Upstream timeout in seconds (default: 30)
//! - `COMFY_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::preview::{StorageRoots, DEFAULT_MAX_CONCURRENT_TRANSCODES, DEFAULT_QUALITY};
use crate::upstream::{object_info_url, DEFAULT_ENDPOINT, DEFAULT_UPSTREAM_TIMEOUT_SECS};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default application config path.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Default template copied into place when the config is missing.
pub const DEFAULT_CONFIG_TEMPLATE_PATH: &str = "config.json.org";

/// Default directory of the built web UI.
pub const DEFAULT_DIST_DIR: &str = "dist";

// =============================================================================
// CLI Arguments
// =============================================================================

/// ComfyUI front-end server.
///
/// Serves the web UI, relays node metadata from ComfyUI and streams
/// compressed previews of generated images.
#[derive(Parser, Debug, Clone)]
#[command(name = "comfy-frontend")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Serve options, used when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// Resolve the command to run, defaulting to `serve`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve(ServeConfig),

    /// Check the configuration, folders and upstream connectivity.
    Check(CheckConfig),
}

/// Options for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Files
    // =========================================================================
    /// Path of the JSON application config.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "COMFY_CONFIG")]
    pub config: PathBuf,

    /// Template copied to the config path when the config does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_TEMPLATE_PATH, env = "COMFY_CONFIG_TEMPLATE")]
    pub config_template: PathBuf,

    /// Directory of the built web UI.
    #[arg(long, default_value = DEFAULT_DIST_DIR, env = "COMFY_DIST")]
    pub dist: PathBuf,

    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "COMFY_HOST")]
    pub host: String,

    /// Port to listen on. Overrides `bun_port` from the config file.
    #[arg(short, long, env = "COMFY_PORT")]
    pub port: Option<u16>,

    // =========================================================================
    // Preview Configuration
    // =========================================================================
    /// JPEG quality for cached previews (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "COMFY_QUALITY")]
    pub quality: u8,

    /// Maximum number of previews transcoded at the same time.
    ///
    /// Each transcode decodes a full-size image into memory.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONCURRENT_TRANSCODES,
        env = "COMFY_MAX_CONCURRENT_TRANSCODES"
    )]
    pub max_concurrent_transcodes: usize,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Timeout for relayed upstream calls, in seconds.
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "COMFY_UPSTREAM_TIMEOUT")]
    pub upstream_timeout: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "COMFY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    /// Disable gzip compression of responses.
    #[arg(long, default_value_t = false)]
    pub no_compression: bool,
}

impl ServeConfig {
    /// Validate the process options.
    pub fn validate(&self) -> Result<(), String> {
        if self.quality == 0 || self.quality > 100 {
            return Err("quality must be between 1 and 100".to_string());
        }

        if self.upstream_timeout == 0 {
            return Err("upstream_timeout must be greater than 0".to_string());
        }

        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }

        if self.max_concurrent_transcodes == 0 {
            return Err("max_concurrent_transcodes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Problem with the upstream endpoint, if any.
    ///
    /// Not fatal: a bad endpoint only breaks the `object_info` relay.
    pub fn endpoint_warning(&self, app: &AppConfig) -> Option<String> {
        object_info_url(&app.comfyui_endpoint)
            .err()
            .map(|e| e.to_string())
    }

    /// Effective listen port: the CLI override, else `bun_port`.
    pub fn port(&self, app: &AppConfig) -> u16 {
        self.port.unwrap_or(app.bun_port)
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self, app: &AppConfig) -> String {
        format!("{}:{}", self.host, self.port(app))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}

/// Options for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Path of the JSON application config.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "COMFY_CONFIG")]
    pub config: PathBuf,

    /// Template copied to the config path when the config does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_TEMPLATE_PATH, env = "COMFY_CONFIG_TEMPLATE")]
    pub config_template: PathBuf,

    /// Directory of the built web UI.
    #[arg(long, default_value = DEFAULT_DIST_DIR, env = "COMFY_DIST")]
    pub dist: PathBuf,

    /// Timeout for the upstream connection test, in seconds.
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "COMFY_UPSTREAM_TIMEOUT")]
    pub upstream_timeout: u64,

    /// Do not contact the upstream engine.
    #[arg(long, default_value_t = false)]
    pub skip_upstream: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Application Config
// =============================================================================

/// The JSON application config.
///
/// Unknown keys are ignored so the file can be shared with the UI tooling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bun_port: u16,
    pub comfyui_endpoint: String,
    pub comfyui_temp_folder: Option<PathBuf>,
    pub comfyui_output_folder: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bun_port: DEFAULT_PORT,
            comfyui_endpoint: DEFAULT_ENDPOINT.to_string(),
            comfyui_temp_folder: None,
            comfyui_output_folder: None,
        }
    }
}

/// Where the application config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the existing config file
    File(PathBuf),
    /// Template was copied to the config path, then read
    Template(PathBuf),
    /// Config unavailable; hardcoded defaults in use
    Defaults { reason: String },
}

/// An application config together with its origin.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: ConfigSource,
}

/// Failure to read or parse a config file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to copy template {template} to {path}: {source}")]
    CopyTemplate {
        template: String,
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl AppConfig {
    /// Parse a config document.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the application config, never failing.
    ///
    /// 1. If `path` does not exist but `template` does, the template is copied
    ///    to `path`.
    /// 2. `path` is read and parsed.
    /// 3. On any failure the hardcoded defaults are used (no image folders, so
    ///    every image request reports a configuration failure).
    pub fn load(path: &Path, template: &Path) -> LoadedConfig {
        match Self::try_load(path, template) {
            Ok((config, source)) => {
                info!(source = ?source, "Loaded application config");
                LoadedConfig { config, source }
            }
            Err(e) => {
                warn!(error = %e, "Using default application config");
                LoadedConfig {
                    config: AppConfig::default(),
                    source: ConfigSource::Defaults {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    fn try_load(path: &Path, template: &Path) -> Result<(Self, ConfigSource), ConfigLoadError> {
        let mut source = ConfigSource::File(path.to_path_buf());

        if !path.exists() && template.exists() {
            fs::copy(template, path).map_err(|e| ConfigLoadError::CopyTemplate {
                template: template.display().to_string(),
                path: path.display().to_string(),
                source: e,
            })?;
            source = ConfigSource::Template(template.to_path_buf());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigLoadError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config = Self::from_json_str(&contents).map_err(|e| ConfigLoadError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok((config, source))
    }

    /// Storage roots for the preview pipeline; empty folder values count as unset.
    pub fn storage_roots(&self) -> StorageRoots {
        fn non_empty(folder: &Option<PathBuf>) -> Option<PathBuf> {
            folder
                .as_ref()
                .filter(|p| !p.as_os_str().is_empty())
                .cloned()
        }

        StorageRoots::new(
            non_empty(&self.comfyui_temp_folder),
            non_empty(&self.comfyui_output_folder),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
