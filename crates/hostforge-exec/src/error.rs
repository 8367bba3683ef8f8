//! Error types for hostforge-exec

use thiserror::Error;

/// Errors that can occur during remote execution
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Host unreachable or handshake failure, typical while a fresh
    /// server is still booting
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The private key is encrypted and no passphrase was supplied
    #[error("private key is encrypted and requires a passphrase")]
    PassphraseRequired,

    /// Authentication was rejected (wrong passphrase or key not accepted)
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Private key could not be read or parsed
    #[error("SSH key error: {0}")]
    KeyError(String),

    /// File transfer over the SFTP sub-channel failed
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Local helper process could not be spawned
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Operation requires an established session
    #[error("not connected")]
    NotConnected,
}

impl ExecError {
    /// Whether the error is transient and worth another connection attempt.
    ///
    /// Passphrase and authentication failures are never retried; they
    /// surface to the operator immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::ConnectionFailed(_))
    }
}
