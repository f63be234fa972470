//! Byte transport used for feed and icon fetches.
//!
//! The coordinator only ever sees the [`Transport`] trait, so tests and embedders can
//! swap the HTTP client for anything that yields bytes for a URL.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Fetches the body behind a URL
#[async_trait]
pub trait Transport: Send + Sync {
    /// Retrieve the complete response body for `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Transport`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the configured timeout and user agent
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Fetching");

        let response = self.client.get(url).send().await?;

        // Check HTTP status before reading the body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        debug!(url, bytes = body.len(), "Fetched");
        Ok(body.to_vec())
    }
}
