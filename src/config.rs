//! Configuration types for lazy-icons

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// HTTP transport settings shared by feed and icon fetches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Feed source configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed URL (default: Top Paid Apps, 75 entries)
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Retry policy for the feed fetch
    #[serde(default = "default_feed_retry")]
    pub retry: RetryConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            retry: default_feed_retry(),
        }
    }
}

/// Icon fetching configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IconConfig {
    /// Edge length of the square icon every fetched image is normalized to (default: 48)
    #[serde(default = "default_icon_size")]
    pub size: u32,

    /// Maximum icon fetches allowed to hit the network at once (default: 6)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retry policy for failed icon fetches
    ///
    /// `None` (the default) drops a failed fetch silently; the row keeps its placeholder
    /// until it is requested again.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            size: default_icon_size(),
            max_concurrent: default_max_concurrent(),
            retry: None,
        }
    }
}

/// Main configuration for the download coordinator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Feed source
    #[serde(default)]
    pub feed: FeedConfig,

    /// Icon fetching
    #[serde(default)]
    pub icons: IconConfig,

    /// Permit plain-http feed and icon URLs (default: false)
    #[serde(default)]
    pub allow_insecure: bool,

    /// Rows reported while no records are loaded (default: 7)
    #[serde(default = "default_placeholder_rows")]
    pub placeholder_rows: usize,

    /// Event broadcast buffer size (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            feed: FeedConfig::default(),
            icons: IconConfig::default(),
            allow_insecure: false,
            placeholder_rows: default_placeholder_rows(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Check the configuration for misconfigurations
    ///
    /// Every error returned here is fatal (see [`Error::is_fatal`]).
    pub fn validate(&self) -> Result<()> {
        check_url(&self.feed.url, self.allow_insecure)?;

        if self.icons.size == 0 {
            return Err(Error::Config {
                message: "icon size must be greater than zero".to_string(),
                key: Some("icons.size".to_string()),
            });
        }

        if self.icons.max_concurrent == 0 {
            return Err(Error::Config {
                message: "icon concurrency limit must be greater than zero".to_string(),
                key: Some("icons.max_concurrent".to_string()),
            });
        }

        if self.event_capacity == 0 {
            return Err(Error::Config {
                message: "event capacity must be greater than zero".to_string(),
                key: Some("event_capacity".to_string()),
            });
        }

        Ok(())
    }
}

/// Parse a feed or icon URL, enforcing the transport security policy
///
/// Only `http` and `https` are accepted; `http` additionally requires `allow_insecure`.
pub fn check_url(raw: &str, allow_insecure: bool) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if allow_insecure => Ok(url),
        "http" => Err(Error::InsecureUrl(raw.to_string())),
        other => Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("lazy-icons/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_feed_url() -> String {
    "https://phobos.apple.com/WebObjects/MZStoreServices.woa/ws/RSS/toppaidapplications/limit=75/xml"
        .to_string()
}

fn default_feed_retry() -> RetryConfig {
    RetryConfig::default()
}

fn default_icon_size() -> u32 {
    48
}

fn default_max_concurrent() -> usize {
    6
}

fn default_placeholder_rows() -> usize {
    7
}

fn default_event_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.icons.size, 48);
        assert_eq!(config.icons.max_concurrent, 6);
        assert!(config.icons.retry.is_none(), "icon failures are dropped by default");
        assert_eq!(config.placeholder_rows, 7);
        assert_eq!(config.transport.timeout, Duration::from_secs(30));
        assert!(!config.allow_insecure);
        assert!(config.feed.url.starts_with("https://"));
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.icons.size, 48);
        assert_eq!(config.feed.retry.max_attempts, 3);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["transport"]["timeout"], 30);
        assert_eq!(json["feed"]["retry"]["initial_delay"], 1);
        assert_eq!(json["feed"]["retry"]["max_delay"], 30);
    }

    #[test]
    fn icon_retry_policy_deserializes_when_present() {
        let json = r#"{ "icons": { "retry": { "max_attempts": 2 } } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        let retry = config.icons.retry.expect("retry policy should be set");
        assert_eq!(retry.max_attempts, 2);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
        assert!(retry.jitter);
    }

    #[test]
    fn validate_rejects_malformed_feed_url() {
        let config = Config {
            feed: FeedConfig {
                url: "not a url".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn validate_rejects_plain_http_feed_without_exception() {
        let mut config = Config::default();
        config.feed.url = "http://example.com/feed.xml".to_string();

        assert!(matches!(
            config.validate().unwrap_err(),
            Error::InsecureUrl(_)
        ));

        config.allow_insecure = true;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_icon_size() {
        let mut config = Config::default();
        config.icons.size = 0;

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("icons.size")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.icons.max_concurrent = 0;

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("icons.max_concurrent"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn check_url_rejects_unsupported_scheme() {
        let err = check_url("ftp://example.com/icon.png", true).unwrap_err();
        match err {
            Error::InvalidUrl { reason, .. } => assert!(reason.contains("ftp")),
            other => panic!("expected invalid URL, got {other:?}"),
        }
    }

    #[test]
    fn check_url_accepts_https() {
        let url = check_url("https://example.com/i.png", false).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }
}
