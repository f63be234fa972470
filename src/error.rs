//! Error types for lazy-icons
//!
//! This module provides error handling for the library, including:
//! - A crate-wide [`Error`] enum covering transport, parse, image and configuration failures
//! - The [`ParseError`] diagnostic produced by the feed parser
//! - Classification of programmer/configuration errors that callers must treat as fatal

use thiserror::Error;

/// Result type alias for lazy-icons operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lazy-icons
///
/// Background work never lets these escape as panics; they travel through the same
/// completion channels as successful results and are surfaced on the owning task.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "feed.url")
        key: Option<String>,
    },

    /// A feed or icon URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL as given
        url: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Plain-http URL used without the insecure-transport exception being configured
    #[error("insecure URL '{0}': plain http requires allow_insecure")]
    InsecureUrl(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Malformed feed XML
    #[error("feed parse error: {0}")]
    Parse(#[from] ParseError),

    /// Icon bytes could not be decoded
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Row index outside the loaded record list
    #[error("row {0} not found")]
    RowNotFound(usize),

    /// The operation was cancelled before it produced a result
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true for programmer/configuration errors
    ///
    /// These indicate a misconfigured embedding (bad feed URL, missing transport security
    /// exception) rather than a runtime condition. The library never aborts on its own;
    /// the application is expected to terminate when it sees one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::InvalidUrl { .. } | Error::InsecureUrl(_)
        )
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidUrl { .. } => "invalid_url",
            Error::InsecureUrl(_) => "insecure_url",
            Error::Network(_) => "network_error",
            Error::HttpStatus { .. } => "http_status",
            Error::Parse(_) => "parse_error",
            Error::Image(_) => "image_error",
            Error::RowNotFound(_) => "row_not_found",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Diagnostic for a malformed feed document
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message} (at byte {position})")]
pub struct ParseError {
    /// Description from the XML reader
    pub message: String,
    /// Byte offset into the feed where parsing stopped
    pub position: u64,
}

impl ParseError {
    /// Create a new parse diagnostic
    pub fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}
