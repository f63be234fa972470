//! # lazy-icons
//!
//! Backend for a scrolling list of apps from a top-apps feed, with icons fetched lazily
//! per row.
//!
//! ## Design Philosophy
//!
//! lazy-icons is designed to be:
//! - **Lazy** - An icon is fetched only once its row is on screen and scrolling has stopped
//! - **Deduplicated** - At most one fetch per row is ever in flight
//! - **Library-first** - No UI, the presentation layer drives a [`DownloadCoordinator`]
//! - **Event-driven** - Consumers subscribe to events instead of polling records
//!
//! ## Quick Start
//!
//! ```no_run
//! use lazy_icons::{Config, DownloadCoordinator, RowKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut coordinator = DownloadCoordinator::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     coordinator.load_feed().await?;
//!     coordinator.set_visible_rows((0..10).map(RowKey));
//!     coordinator.load_visible_icons()?;
//!
//!     while let Some(completion) = coordinator.next_completion().await {
//!         println!("Completed: {:?}", completion);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Per-row icon download coordination
pub mod coordinator;
/// Error types
pub mod error;
/// Feed fetching and parsing
pub mod feed;
/// Single icon fetch tasks and image normalization
pub mod icon;
/// Streaming feed parser
pub mod parser;
/// Retry logic with exponential backoff
pub mod retry;
/// Byte transport abstraction
pub mod transport;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, FeedConfig, IconConfig, RetryConfig, TransportConfig};
pub use coordinator::DownloadCoordinator;
pub use error::{Error, ParseError, Result};
pub use feed::FeedLoader;
pub use icon::IconFetchTask;
pub use parser::{FeedParser, ParseOperation, ParseOutcome};
pub use transport::{HttpTransport, Transport};
pub use types::{
    AppRecord, Completion, Event, Icon, RequestOutcome, RowIcon, RowKey, ScrollState,
};
