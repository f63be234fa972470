//! Download coordinator: owns the record list and the in-flight icon fetches.
//!
//! All mutable state lives in one [`DownloadCoordinator`] that is driven from a single
//! owning task through `&mut self`, so nothing here is locked. Background fetches report
//! back through an mpsc queue; their results are applied only when the owner drains it
//! with [`process_completions`](DownloadCoordinator::process_completions) or
//! [`next_completion`](DownloadCoordinator::next_completion).
//!
//! Fetches start only while scrolling is idle. Requests made during a scroll are not
//! queued; when the scroll ends, [`end_scroll`](DownloadCoordinator::end_scroll) runs a
//! reconciliation pass over the rows visible at that moment.

use crate::config::{Config, check_url};
use crate::error::{Error, Result};
use crate::feed::FeedLoader;
use crate::icon::{FetchContext, IconFetchTask, IconMessage, IconOutcome};
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    AppRecord, Completion, Event, RequestOutcome, RowIcon, RowKey, ScrollState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-key deduplicating, cancellable icon fetch manager
pub struct DownloadCoordinator {
    config: Arc<Config>,
    feed_loader: FeedLoader,
    /// Feed records in document order; index == row
    records: Vec<AppRecord>,
    /// At most one fetch per row
    in_flight: HashMap<RowKey, IconFetchTask>,
    next_ticket: u64,
    scroll: ScrollState,
    visible: Vec<RowKey>,
    fetch_context: FetchContext,
    completions: mpsc::UnboundedReceiver<IconMessage>,
    event_tx: broadcast::Sender<Event>,
    /// Cancels an in-progress feed load
    feed_cancel: CancellationToken,
}

impl DownloadCoordinator {
    /// Create a coordinator that fetches over HTTP
    ///
    /// # Errors
    /// Returns a fatal error if the configuration is invalid, or if the HTTP client
    /// cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.transport)?);
        Self::with_transport(config, transport)
    }

    /// Create a coordinator using a custom transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        let (completions_tx, completions) = mpsc::unbounded_channel();

        let fetch_context = FetchContext {
            transport: transport.clone(),
            limiter: Arc::new(Semaphore::new(config.icons.max_concurrent)),
            size: config.icons.size,
            retry: config.icons.retry.clone(),
            completions: completions_tx,
        };
        let feed_loader = FeedLoader::new(transport, config.feed.clone(), config.allow_insecure);

        Ok(Self {
            config: Arc::new(config),
            feed_loader,
            records: Vec::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            scroll: ScrollState::Idle,
            visible: Vec::new(),
            fetch_context,
            completions,
            event_tx,
            feed_cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to coordinator events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Fetch and parse the feed, then take ownership of its records
    ///
    /// Transport and parse failures emit [`Event::FeedFailed`] before being returned.
    /// Fatal misconfiguration errors are returned without an event. If the load is
    /// cancelled through [`feed_cancellation_token`](Self::feed_cancellation_token), the
    /// current records stay in place and [`Error::Cancelled`] is returned.
    pub async fn load_feed(&mut self) -> Result<usize> {
        let result = self.feed_loader.load(&self.feed_cancel).await;
        match result {
            Ok(Some(records)) => {
                let count = records.len();
                self.set_records(records);
                Ok(count)
            }
            Ok(None) => {
                debug!("Feed load cancelled, keeping current records");
                self.feed_cancel = CancellationToken::new();
                Err(Error::Cancelled)
            }
            Err(e) => {
                if e.is_fatal() {
                    warn!(error = %e, "Feed load misconfigured");
                } else {
                    warn!(error = %e, url = self.feed_loader.url(), "Feed load failed");
                    self.emit(Event::FeedFailed {
                        message: e.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    /// Token that cancels an in-progress [`load_feed`](Self::load_feed)
    pub fn feed_cancellation_token(&self) -> CancellationToken {
        self.feed_cancel.clone()
    }

    /// Replace the record list
    ///
    /// Outstanding fetches belong to the old rows, so they are cancelled first.
    pub fn set_records(&mut self, records: Vec<AppRecord>) {
        self.cancel_all();
        self.records = records;
        info!(records = self.records.len(), "Records loaded");
        self.emit(Event::FeedLoaded {
            count: self.records.len(),
        });
    }

    /// All records in feed order
    pub fn records(&self) -> &[AppRecord] {
        &self.records
    }

    /// Record shown in `row`
    pub fn record(&self, row: RowKey) -> Option<&AppRecord> {
        self.records.get(row.index())
    }

    /// Number of rows to present
    ///
    /// Before any record is loaded this is the placeholder row count.
    pub fn row_count(&self) -> usize {
        if self.records.is_empty() {
            self.config.placeholder_rows
        } else {
            self.records.len()
        }
    }

    /// What the row's image slot should show
    pub fn row_icon(&self, row: RowKey) -> RowIcon<'_> {
        match self.record(row).and_then(|r| r.icon.as_ref()) {
            Some(icon) => RowIcon::Loaded(icon),
            None => RowIcon::Placeholder,
        }
    }

    // ------------------------------------------------------------------
    // Scroll gate and visibility
    // ------------------------------------------------------------------

    /// Current scroll state
    pub fn scroll_state(&self) -> ScrollState {
        self.scroll
    }

    /// The user started dragging; new fetches are deferred until the scroll ends
    pub fn begin_scroll(&mut self) {
        self.scroll = ScrollState::Dragging;
    }

    /// The drag ended
    ///
    /// If the list keeps moving the scroll continues as a deceleration and nothing is
    /// requested yet. Otherwise this is the end of the scroll, as with
    /// [`end_scroll`](Self::end_scroll). Returns the number of fetches started.
    pub fn end_drag(&mut self, will_decelerate: bool) -> Result<usize> {
        if will_decelerate {
            self.scroll = ScrollState::Decelerating;
            return Ok(0);
        }
        self.end_scroll()
    }

    /// Scrolling stopped: go idle and request icons for the visible rows
    ///
    /// Returns the number of fetches started.
    pub fn end_scroll(&mut self) -> Result<usize> {
        self.scroll = ScrollState::Idle;
        self.load_visible_icons()
    }

    /// Rows currently on screen
    pub fn set_visible_rows(&mut self, rows: impl IntoIterator<Item = RowKey>) {
        self.visible = rows.into_iter().collect();
    }

    /// Rows last reported as visible
    pub fn visible_rows(&self) -> &[RowKey] {
        &self.visible
    }

    /// A row is about to be displayed
    ///
    /// Only records without an icon are requested, and only while scrolling is idle.
    /// Before the feed has loaded every row is a placeholder and nothing is requested.
    pub fn row_will_display(&mut self, row: RowKey) -> Result<RequestOutcome> {
        if self.records.is_empty() {
            return Ok(RequestOutcome::Placeholder);
        }
        self.request_icon(row)
    }

    /// Reconciliation pass: request icons for every visible row still missing one
    ///
    /// Rows that scrolled away before their fetch could start are not revisited here.
    /// Returns the number of fetches started.
    pub fn load_visible_icons(&mut self) -> Result<usize> {
        if self.records.is_empty() {
            return Ok(0);
        }

        let mut started = 0;
        for row in self.visible.clone() {
            if row.index() >= self.records.len() {
                continue;
            }
            if self.request_icon(row)? == RequestOutcome::Started {
                started += 1;
            }
        }

        if started > 0 {
            debug!(started, "Requested icons for visible rows");
        }
        Ok(started)
    }

    // ------------------------------------------------------------------
    // In-flight map
    // ------------------------------------------------------------------

    /// Ask for the icon of `row`
    ///
    /// No-op if the icon is already resolved, a fetch for the row is already running, or
    /// scrolling is in progress. Otherwise a fetch is registered under `row` and started.
    ///
    /// # Errors
    /// - [`Error::RowNotFound`] if `row` is outside the record list
    /// - [`Error::InvalidUrl`] / [`Error::InsecureUrl`] for a record whose icon URL cannot
    ///   be fetched under the configured transport security policy (fatal)
    pub fn request_icon(&mut self, row: RowKey) -> Result<RequestOutcome> {
        let record = self
            .records
            .get(row.index())
            .ok_or(Error::RowNotFound(row.index()))?;

        if record.has_icon() {
            return Ok(RequestOutcome::AlreadyLoaded);
        }
        if self.in_flight.contains_key(&row) {
            return Ok(RequestOutcome::InFlight);
        }
        if self.scroll.is_scrolling() {
            return Ok(RequestOutcome::Deferred);
        }
        let Some(raw_url) = record.icon_url.as_deref() else {
            debug!(row = %row, "Record has no icon URL");
            return Ok(RequestOutcome::NoIconUrl);
        };
        let url = check_url(raw_url, self.config.allow_insecure)?;

        self.next_ticket += 1;
        let mut task = IconFetchTask::new(row, self.next_ticket, url, self.fetch_context.clone());
        task.start();
        self.in_flight.insert(row, task);

        Ok(RequestOutcome::Started)
    }

    /// Whether a fetch is registered for `row`
    pub fn is_in_flight(&self, row: RowKey) -> bool {
        self.in_flight.contains_key(&row)
    }

    /// Number of registered fetches
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Cancel every outstanding fetch and clear the in-flight map
    pub fn cancel_all(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }

        let count = self.in_flight.len();
        for (_, mut task) in self.in_flight.drain() {
            task.cancel();
        }
        info!(cancelled = count, "Cancelled all icon fetches");
    }

    /// Low-memory signal: drop all outstanding work
    pub fn handle_memory_warning(&mut self) {
        warn!("Memory warning, terminating icon fetches");
        self.cancel_all();
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Apply every completion that has already arrived, without waiting
    pub fn process_completions(&mut self) -> Vec<Completion> {
        let mut applied = Vec::new();
        while let Ok(message) = self.completions.try_recv() {
            if let Some(completion) = self.apply_completion(message) {
                applied.push(completion);
            }
        }
        applied
    }

    /// Wait for the next completion and apply it
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        loop {
            if self.in_flight.is_empty() {
                return None;
            }
            let message = self.completions.recv().await?;
            if let Some(completion) = self.apply_completion(message) {
                return Some(completion);
            }
        }
    }

    fn apply_completion(&mut self, message: IconMessage) -> Option<Completion> {
        let key = message.key;
        match self.in_flight.get(&key) {
            Some(task) if task.ticket() == message.ticket => {}
            _ => {
                debug!(row = %key, "Dropping stale icon completion");
                return None;
            }
        }
        self.in_flight.remove(&key);

        match message.outcome {
            IconOutcome::Loaded(icon) => {
                let record = self.records.get_mut(key.index())?;
                if record.icon.is_none() {
                    record.icon = Some(icon);
                }
                debug!(row = %key, "Icon ready");
                self.emit(Event::IconReady { row: key });
                Some(Completion::IconReady(key))
            }
            IconOutcome::Failed(e) => {
                // Not retried here and not surfaced; the row keeps its placeholder
                debug!(row = %key, error = %e, "Icon fetch failed");
                Some(Completion::Failed(key))
            }
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

impl Drop for DownloadCoordinator {
    fn drop(&mut self) {
        self.feed_cancel.cancel();
        self.cancel_all();
    }
}
