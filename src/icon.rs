//! Icon fetch task: download one image, normalize it to a square icon, and report back.
//!
//! A task never touches records. It posts a single [`IconMessage`] to the coordinator's
//! completion queue, and only if it was not cancelled first.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::transport::Transport;
use crate::types::{Icon, RowKey};
use image::DynamicImage;
use image::imageops::FilterType;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Outcome of one icon fetch
#[derive(Debug)]
pub(crate) enum IconOutcome {
    Loaded(Icon),
    Failed(Error),
}

/// Completion posted by a task to its coordinator
#[derive(Debug)]
pub(crate) struct IconMessage {
    pub(crate) key: RowKey,
    /// Identifies the task instance, so late messages from replaced tasks can be dropped
    pub(crate) ticket: u64,
    pub(crate) outcome: IconOutcome,
}

/// Everything a task needs besides its own key and URL
#[derive(Clone)]
pub(crate) struct FetchContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) limiter: Arc<Semaphore>,
    pub(crate) size: u32,
    pub(crate) retry: Option<RetryConfig>,
    pub(crate) completions: mpsc::UnboundedSender<IconMessage>,
}

/// A single cancellable icon download
pub struct IconFetchTask {
    key: RowKey,
    ticket: u64,
    url: Url,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    context: FetchContext,
}

impl IconFetchTask {
    pub(crate) fn new(key: RowKey, ticket: u64, url: Url, context: FetchContext) -> Self {
        Self {
            key,
            ticket,
            url,
            cancel: CancellationToken::new(),
            handle: None,
            context,
        }
    }

    /// Row this task fetches for
    pub fn key(&self) -> RowKey {
        self.key
    }

    /// Icon URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Begin the fetch in the background
    ///
    /// Not idempotent: each call issues another request. The coordinator guarantees a
    /// single call per task.
    pub fn start(&mut self) {
        debug!(row = %self.key, url = %self.url, "Starting icon fetch");
        let handle = tokio::spawn(run(
            self.key,
            self.ticket,
            self.url.clone(),
            self.context.clone(),
            self.cancel.clone(),
        ));
        self.handle = Some(handle);
    }

    /// Cancel the fetch; no completion is posted afterwards
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

async fn run(key: RowKey, ticket: u64, url: Url, context: FetchContext, cancel: CancellationToken) {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(row = %key, "Icon fetch cancelled");
            return;
        }
        outcome = fetch_icon(&context, &url) => outcome,
    };

    if cancel.is_cancelled() {
        return;
    }

    // The receiver only goes away with the coordinator itself
    context
        .completions
        .send(IconMessage {
            key,
            ticket,
            outcome,
        })
        .ok();
}

async fn fetch_icon(context: &FetchContext, url: &Url) -> IconOutcome {
    let _permit = match context.limiter.acquire().await {
        Ok(permit) => permit,
        Err(_) => return IconOutcome::Failed(Error::Cancelled),
    };

    let bytes = match &context.retry {
        Some(retry) => fetch_with_retry(retry, || context.transport.fetch(url.as_str())).await,
        None => context.transport.fetch(url.as_str()).await,
    };
    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(e) => return IconOutcome::Failed(e),
    };

    let size = context.size;
    let decoded = tokio::task::spawn_blocking(move || decode_icon(&bytes, size)).await;
    match decoded {
        Ok(Ok(icon)) => IconOutcome::Loaded(icon),
        Ok(Err(e)) => IconOutcome::Failed(e),
        Err(e) => IconOutcome::Failed(Error::Other(format!("icon decode task failed: {}", e))),
    }
}

/// Decode image bytes and normalize them to a `size`×`size` icon
pub fn decode_icon(bytes: &[u8], size: u32) -> Result<Icon> {
    let image = image::load_from_memory(bytes)?;
    Ok(normalize_icon(image, size))
}

/// Resample to exactly `size`×`size` unless the image already has those dimensions
pub fn normalize_icon(image: DynamicImage, size: u32) -> Icon {
    if image.width() == size && image.height() == size {
        Icon::new(image.into_rgba8())
    } else {
        Icon::new(
            image
                .resize_exact(size, size, FilterType::Lanczos3)
                .into_rgba8(),
        )
    }
}
