//! Post-creation provisioning of a fresh host
//!
//! Composes the host-key trust step, the optional credential upload and
//! the setup command chain against a newly created server. Only the
//! connection phase retries; a failed command is reported, never re-run,
//! since command side effects are not guaranteed idempotent.

use std::path::Path;

use tracing::{info, instrument};

use hostforge_exec::{ExecError, HostKeyStore, RemoteExecutor};

/// What the operator gets back for review
#[derive(Debug)]
pub struct ProvisionReport {
    /// Exit status of the setup chain (0 when every step succeeded)
    pub status: i32,
    /// Combined stdout/stderr of the setup chain
    pub output: String,
    /// Remote path the credential bundle was uploaded to, if any
    pub uploaded_to: Option<String>,
}

impl ProvisionReport {
    /// Whether every setup step succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// One provisioning pass over a single new host
pub struct ProvisioningSession {
    host: String,
    executor: Box<dyn RemoteExecutor>,
    host_keys: Box<dyn HostKeyStore>,
}

impl ProvisioningSession {
    /// Create a session for `host` using the given executor and host-key
    /// store
    pub fn new(
        host: impl Into<String>,
        executor: Box<dyn RemoteExecutor>,
        host_keys: Box<dyn HostKeyStore>,
    ) -> Self {
        Self {
            host: host.into(),
            executor,
            host_keys,
        }
    }

    /// Run the provisioning pass: trust the host key, upload the
    /// credential bundle when given, then execute `commands` joined with
    /// `&&` so any failing step aborts the remainder.
    ///
    /// # Errors
    /// Connection, authentication and upload errors propagate; a non-zero
    /// command status is not an error and lands in the report instead.
    #[instrument(skip_all, fields(host = %self.host))]
    pub async fn run(
        &mut self,
        credential: Option<(&Path, String)>,
        commands: &[String],
    ) -> Result<ProvisionReport, ExecError> {
        self.host_keys.trust(&self.host).await?;

        let uploaded_to = match credential {
            Some((local, remote)) => {
                self.executor.upload(local, &remote).await?;
                info!(remote = %remote, "credential bundle uploaded");
                Some(remote)
            }
            None => None,
        };

        let chain = commands.join(" && ");
        let result = self.executor.run(&chain).await?;

        info!(status = result.status, "setup chain finished");
        Ok(ProvisionReport {
            status: result.status,
            output: result.combined_output(),
            uploaded_to,
        })
    }
}
