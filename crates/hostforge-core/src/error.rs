//! Core error types

use thiserror::Error;

/// Errors that can occur in core session and validation logic
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// API token failed format validation
    #[error("invalid API token: must be 64 alphanumeric characters")]
    InvalidApiToken,

    /// Server name failed hostname validation
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
}
