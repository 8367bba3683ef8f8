//! Error types for the update subsystem

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during an update transaction or agent swap
#[derive(Error, Debug, Clone)]
pub enum UpdateError {
    /// Remote resource unreachable
    #[error("network error: {0}")]
    Network(String),

    /// Download endpoint answered with a non-success status
    #[error("download failed with HTTP status {0}")]
    HttpStatus(u16),

    /// Digest of an artifact does not match the expected digest
    #[error("digest mismatch: expected {expected}, got {actual}")]
    Integrity {
        /// Digest from the version descriptor
        expected: String,
        /// Digest computed over the artifact on disk
        actual: String,
    },

    /// Staged artifact is not where the agent expects it
    #[error("staged artifact not found: {0}")]
    StagedMissing(PathBuf),

    /// Version descriptor could not be parsed
    #[error("malformed version descriptor: {0}")]
    Descriptor(String),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The relaunched process could not be started
    #[error("relaunch failed: {0}")]
    Relaunch(String),
}

impl UpdateError {
    /// Whether the agent's swap loop should retry after this error.
    ///
    /// File-system hiccups and a not-yet-visible staged artifact are
    /// tolerated while the parent process finishes exiting; an integrity
    /// mismatch is never retried with the same artifact.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpdateError::Io(_) | UpdateError::StagedMissing(_) | UpdateError::Network(_)
        )
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(e: reqwest::Error) -> Self {
        UpdateError::Network(e.to_string())
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(e: std::io::Error) -> Self {
        UpdateError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_errors_are_terminal() {
        let err = UpdateError::Integrity {
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert!(!err.is_retryable());
        assert!(!UpdateError::Relaunch("spawn".into()).is_retryable());
    }

    #[test]
    fn io_and_missing_staged_are_retryable() {
        assert!(UpdateError::Io("busy".into()).is_retryable());
        assert!(UpdateError::StagedMissing(PathBuf::from("/tmp/x.new")).is_retryable());
    }
}
