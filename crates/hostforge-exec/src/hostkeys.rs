//! Host-key trust for freshly created servers
//!
//! A new server's host key is unknown, and its IP may carry a stale entry
//! from a previous allocation. Before the first connection attempt the
//! stale entry is removed and the current key is scanned and appended to
//! `known_hosts`. This runs once per new host address, independent of the
//! session itself.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ExecError;

/// Records which host addresses are trusted
#[async_trait]
pub trait HostKeyStore: Send + Sync {
    /// Register `host` as trusted, replacing any stale entry for the
    /// same address.
    async fn trust(&self, host: &str) -> Result<(), ExecError>;
}

/// `HostKeyStore` backed by the operator's `~/.ssh/known_hosts`,
/// maintained with the stock OpenSSH tooling
#[derive(Debug, Clone)]
pub struct SystemKnownHosts {
    path: PathBuf,
}

impl SystemKnownHosts {
    /// Use the default `~/.ssh/known_hosts` location
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if the home directory cannot be
    /// resolved.
    pub fn new() -> Result<Self, ExecError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ExecError::IoError("home directory not found".to_string()))?;
        Ok(Self {
            path: home.join(".ssh").join("known_hosts"),
        })
    }

    /// Use an explicit known_hosts file
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn remove_stale_entry(&self, host: &str) {
        // ssh-keygen -R fails when the file has no entry for the host;
        // that is not an error for us
        let removed = Command::new("ssh-keygen")
            .arg("-R")
            .arg(host)
            .arg("-f")
            .arg(&self.path)
            .output()
            .await;

        match removed {
            Ok(output) if output.status.success() => {
                debug!(host, "removed stale known_hosts entry");
            }
            Ok(_) => debug!(host, "no stale known_hosts entry to remove"),
            Err(e) => warn!(host, error = %e, "ssh-keygen -R failed"),
        }
    }

    async fn scan_host_key(&self, host: &str) -> Result<Vec<u8>, ExecError> {
        let output = Command::new("ssh-keyscan")
            .arg("-H")
            .arg(host)
            .output()
            .await
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(ExecError::ConnectionFailed(format!(
                "ssh-keyscan returned no key for {host}"
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl HostKeyStore for SystemKnownHosts {
    #[instrument(skip(self))]
    async fn trust(&self, host: &str) -> Result<(), ExecError> {
        self.remove_stale_entry(host).await;

        let keys = self.scan_host_key(host).await?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        file.write_all(&keys)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        debug!(host, path = %self.path.display(), "host key registered");
        Ok(())
    }
}
