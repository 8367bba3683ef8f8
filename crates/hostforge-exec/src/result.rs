//! Result types for remote command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a remote command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output, fully drained
    pub stdout: String,
    /// stderr output, fully drained
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if the command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Combine stdout and stderr for operator review
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Connection target for an SSH session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub user: String,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info with the default SSH port
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
        }
    }

    /// Set a custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_skips_empty_stderr() {
        let result = CommandResult {
            status: 0,
            stdout: "ok".into(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        };
        assert_eq!(result.combined_output(), "ok");
        assert!(result.success());
    }

    #[test]
    fn combined_output_appends_stderr() {
        let result = CommandResult {
            status: 1,
            stdout: "partial".into(),
            stderr: "boom".into(),
            duration: Duration::from_millis(1),
        };
        assert_eq!(result.combined_output(), "partial\nboom");
        assert!(!result.success());
    }
}
