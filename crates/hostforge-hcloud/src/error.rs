//! Error types for the cloud API client

use thiserror::Error;

/// Errors that can occur when talking to the cloud API
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// API returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body from the server
        message: String,
    },
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
