//! Relay client for the upstream ComfyUI engine.
//!
//! Only one call is relayed: `GET <endpoint>/object_info`, the node catalogue
//! the web UI needs at startup. Relaying it lets the front-end compress the
//! (large) JSON body for the browser.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::UpstreamError;

/// Default upstream endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8188";

/// Default timeout for relayed calls in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// HTTP client bound to one upstream endpoint.
///
/// A malformed endpoint does not prevent construction: the rest of the UI
/// keeps working and every relayed call reports
/// [`UpstreamError::InvalidEndpoint`].
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    endpoint: String,
    object_info_url: Option<Url>,
}

impl UpstreamClient {
    /// Create a client for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Connection`] if the HTTP client cannot be
    /// built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let endpoint = endpoint.into();
        let object_info_url = object_info_url(&endpoint).ok();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            object_info_url,
        })
    }

    /// The endpoint as configured, reported verbatim to the UI.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `<endpoint>/object_info`, or `None` if the endpoint is malformed.
    pub fn object_info_url(&self) -> Option<&Url> {
        self.object_info_url.as_ref()
    }

    /// Fetch the node catalogue.
    ///
    /// Returns the upstream body unchanged once it has been checked to be JSON.
    pub async fn object_info(&self) -> Result<Bytes, UpstreamError> {
        let url = match &self.object_info_url {
            Some(url) => url.clone(),
            None => object_info_url(&self.endpoint)?,
        };
        debug!(url = %url, "Relaying object_info");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;

        serde_json::from_slice::<serde::de::IgnoredAny>(&body)
            .map_err(|e| UpstreamError::InvalidBody(e.to_string()))?;

        Ok(body)
    }
}

/// Build `<endpoint>/object_info`, tolerating a trailing slash on the endpoint.
pub fn object_info_url(endpoint: &str) -> Result<Url, UpstreamError> {
    let invalid = |message: String| UpstreamError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };

    let url = Url::parse(&format!("{}/object_info", endpoint.trim_end_matches('/')))
        .map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme: {}", other))),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(err.to_string())
    } else {
        UpstreamError::Connection(err.to_string())
    }
}
