//! CDP endpoint discovery via HTTP.
//!
//! A debuggable Chrome exposes `/json/version` on its remote-debugging
//! port; the response carries the browser-level WebSocket URL.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::CdpError;

/// Default timeout for HTTP endpoint discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Response from the `/json/version` endpoint.
#[derive(Debug, Deserialize)]
pub struct BrowserVersion {
    /// Browser name and version.
    #[serde(rename = "Browser")]
    pub browser: Option<String>,
    /// Protocol version.
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: Option<String>,
    /// User agent string.
    #[serde(rename = "User-Agent")]
    pub user_agent: Option<String>,
    /// The WebSocket URL for the browser-level CDP connection.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: Option<String>,
}

/// Options for CDP endpoint discovery.
#[derive(Debug, Clone, Default)]
pub struct CdpConnectionOptions {
    /// Timeout for the discovery request.
    pub timeout: Option<Duration>,
}

impl CdpConnectionOptions {
    /// Create new options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the discovery timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Discover the WebSocket URL from an HTTP debugging endpoint.
///
/// Given a URL like `http://localhost:9222`, fetches `/json/version` and
/// returns the `webSocketDebuggerUrl`.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the HTTP request fails, or the
/// response carries no WebSocket URL.
#[instrument(level = "debug", skip(options))]
pub async fn discover_websocket_url(
    endpoint_url: &str,
    options: &CdpConnectionOptions,
) -> Result<String, CdpError> {
    let base_url = Url::parse(endpoint_url)
        .map_err(|e| CdpError::InvalidEndpointUrl(format!("{endpoint_url}: {e}")))?;
    let version_url = base_url
        .join("/json/version")
        .map_err(|e| CdpError::InvalidEndpointUrl(e.to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(options.timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT))
        .build()
        .map_err(|e| CdpError::Discovery(e.to_string()))?;

    let version: BrowserVersion = client
        .get(version_url)
        .send()
        .await
        .map_err(|e| CdpError::Discovery(e.to_string()))?
        .json()
        .await
        .map_err(|e| CdpError::Discovery(e.to_string()))?;

    debug!(browser = ?version.browser, "discovered browser endpoint");

    version
        .web_socket_debugger_url
        .ok_or(CdpError::NoDebuggerUrl)
}

#[cfg(test)]
mod tests;
