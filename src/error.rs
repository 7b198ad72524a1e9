//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a node
///
/// Every payload is owned text so an error can be cloned and handed to each
/// waiter of a shared (deduplicated) resource fetch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A resource answered with a non-success HTTP status
    #[error("cannot fetch resource: {url}, status: {status}")]
    HttpStatus { url: String, status: u16 },

    /// A resource fetch exceeded `http_timeout_ms`
    #[error("timeout of {timeout_ms}ms occured while fetching resource: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    /// Network error (connection refused, TLS, body read...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A URL could not be parsed or resolved against its base
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An image or data URI could not be decoded
    #[error("Image decode failed: {0}")]
    DecodeError(String),

    /// Failed to draw or encode the canvas
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// A stylesheet refused access to its rules (cross-origin without CORS)
    #[error("Stylesheet not accessible: {0}")]
    StyleSheetAccess(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}
