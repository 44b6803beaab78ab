// # HTTP IP Source
//
// Discovers the host's public IPv4 address through a "what is my IP" text
// endpoint.
//
// ## Behavior
//
// - One GET per call, 10 second request timeout
// - The body is trimmed and the first dotted-quad is extracted
// - Blank bodies, bodies without an address, HTTP errors and transport
//   failures are all `IpSource` errors
//
// No caching and no retries: every engine run asks again, and a failed
// lookup aborts the run before anything is mutated.

use std::time::Duration;

use ipchange_core::traits::ExternalIpSource;
use ipchange_core::{Error, Result};
use regex::Regex;
use tracing::debug;

/// Default IP check service (plain text body with the caller's address)
pub const DEFAULT_IP_URL: &str = "http://checkip.amazonaws.com/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DOTTED_QUAD: &str = r"\b(?:\d{1,3}\.){3}\d{1,3}\b";

/// HTTP-based external IP source
pub struct HttpIpSource {
    /// URL to fetch the IP from
    url: String,

    /// Matches the first dotted-quad of a response body
    pattern: Regex,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source for the given URL
    ///
    /// # Parameters
    ///
    /// - `url`: Text endpoint to GET (e.g. [`DEFAULT_IP_URL`])
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::ip_source(format!("Failed to build HTTP client: {e}")))?;

        let pattern = Regex::new(DOTTED_QUAD)
            .map_err(|e| Error::ip_source(format!("Invalid address pattern: {e}")))?;

        Ok(Self {
            url: url.into(),
            pattern,
            client,
        })
    }

    /// Create a source for [`DEFAULT_IP_URL`]
    pub fn with_default_url() -> Result<Self> {
        Self::new(DEFAULT_IP_URL)
    }

    /// URL this source queries
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Extract the first dotted-quad from a response body
    fn extract(&self, body: &str) -> Result<String> {
        let body = body.trim();
        if body.is_empty() {
            return Err(Error::ip_source(format!("Empty response from {}", self.url)));
        }

        self.pattern
            .find(body)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                Error::ip_source(format!("No IPv4 address in response from {}: '{body}'", self.url))
            })
    }
}

#[async_trait::async_trait]
impl ExternalIpSource for HttpIpSource {
    async fn current(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "HTTP error from {}: {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {e}")))?;

        let ip = self.extract(&body)?;
        debug!("External IP from {}: {}", self.url, ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
