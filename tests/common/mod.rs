//! Common test utilities for lazy-icons integration tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use lazy_icons::{Config, DownloadCoordinator, Event, RetryConfig};
use std::time::Duration;
use tokio::sync::broadcast;

/// Config pointed at a local mock server, with retries off
pub fn test_config(feed_url: String) -> Config {
    let mut config = Config::default();
    config.feed.url = feed_url;
    config.feed.retry = RetryConfig {
        max_attempts: 0,
        ..Default::default()
    };
    // wiremock only speaks plain http
    config.allow_insecure = true;
    config
}

/// Drain completions until nothing is in flight
pub async fn drain_completions(coordinator: &mut DownloadCoordinator, timeout: Duration) {
    let _ = tokio::time::timeout(timeout, async {
        while coordinator.next_completion().await.is_some() {}
    })
    .await;
}

/// Collect events already delivered to `events`
pub fn collect_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}
