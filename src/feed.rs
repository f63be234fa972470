//! Feed loading: fetch the feed document, then parse it off the owning task.

use crate::config::{FeedConfig, check_url};
use crate::error::{Error, Result};
use crate::parser::ParseOperation;
use crate::retry::fetch_with_retry;
use crate::transport::Transport;
use crate::types::AppRecord;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fetches and parses the app feed
pub struct FeedLoader {
    transport: Arc<dyn Transport>,
    config: FeedConfig,
    allow_insecure: bool,
}

impl FeedLoader {
    /// Create a loader for the configured feed
    pub fn new(transport: Arc<dyn Transport>, config: FeedConfig, allow_insecure: bool) -> Self {
        Self {
            transport,
            config,
            allow_insecure,
        }
    }

    /// Feed URL this loader reads
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Fetch and parse the feed
    ///
    /// Returns `Ok(None)` when `cancel` fires before a result is available; no partial
    /// record list is ever returned.
    ///
    /// # Errors
    /// - [`Error::InvalidUrl`] / [`Error::InsecureUrl`] for a misconfigured feed URL (fatal)
    /// - transport errors once the retry policy is exhausted
    /// - [`Error::Parse`] for a malformed document
    pub async fn load(&self, cancel: &CancellationToken) -> Result<Option<Vec<AppRecord>>> {
        let url = check_url(&self.config.url, self.allow_insecure)?;
        info!(url = %url, "Loading feed");

        let fetch = fetch_with_retry(&self.config.retry, || self.transport.fetch(url.as_str()));
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Feed fetch cancelled");
                return Ok(None);
            }
            data = fetch => data?,
        };

        let operation = ParseOperation::spawn_with_token(data, cancel.child_token());
        match operation.finished().await {
            Some(Ok(records)) => Ok(Some(records)),
            Some(Err(e)) => Err(Error::Parse(e)),
            None => Ok(None),
        }
    }
}
