//! Core types for lazy-icons

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of a row: its position in the feed's record list
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(pub usize);

impl RowKey {
    /// Create a new RowKey
    pub fn new(row: usize) -> Self {
        Self(row)
    }

    /// Get the row index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for RowKey {
    fn from(row: usize) -> Self {
        Self(row)
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded, size-normalized icon
///
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct Icon {
    image: Arc<RgbaImage>,
}

impl Icon {
    /// Wrap a decoded bitmap
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The underlying bitmap
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// One entry of the app feed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppRecord {
    /// App name (`im:name`)
    pub name: Option<String>,
    /// Developer (`im:artist`)
    pub artist: Option<String>,
    /// Icon location (`im:image`)
    pub icon_url: Option<String>,
    /// App store page (`id`)
    pub detail_url: Option<String>,
    /// Resolved icon, set once by the coordinator after a successful fetch
    pub icon: Option<Icon>,
}

impl AppRecord {
    /// Whether the icon has been resolved
    pub fn has_icon(&self) -> bool {
        self.icon.is_some()
    }
}

/// Scroll state reported by the presentation layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollState {
    /// Not moving; icon fetches may start
    #[default]
    Idle,
    /// User is dragging
    Dragging,
    /// Content is still moving after the drag ended
    Decelerating,
}

impl ScrollState {
    /// True while new fetches must be held back
    pub fn is_scrolling(&self) -> bool {
        !matches!(self, ScrollState::Idle)
    }
}

/// What a row should show in its image slot
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RowIcon<'a> {
    /// No icon yet (deferred, in flight, failed, or no data loaded)
    Placeholder,
    /// The resolved icon
    Loaded(&'a Icon),
}

/// Result of asking the coordinator for a row's icon
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A fetch was created and started
    Started,
    /// The record already has its icon
    AlreadyLoaded,
    /// A fetch for this row is already running
    InFlight,
    /// Scrolling is in progress; the row is picked up by the next reconciliation pass
    Deferred,
    /// The record carries no icon URL
    NoIconUrl,
    /// No records are loaded yet; the row is one of the placeholder rows
    Placeholder,
}

/// Completion of one icon fetch, as observed on the owning task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Icon written into the record
    IconReady(RowKey),
    /// Fetch failed; the row keeps its placeholder
    Failed(RowKey),
}

/// Events emitted by the coordinator
///
/// Subscribe via [`DownloadCoordinator::subscribe`](crate::DownloadCoordinator::subscribe).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Feed parsed and records handed to the coordinator
    FeedLoaded {
        /// Number of records
        count: usize,
    },

    /// Feed could not be fetched or parsed; the user should be told
    FeedFailed {
        /// Error message
        message: String,
    },

    /// A row's icon became available
    IconReady {
        /// Row whose icon was written
        row: RowKey,
    },
}
