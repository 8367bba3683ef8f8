//! Remote executor trait

use std::path::Path;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::session::RemoteSession;

/// Seam between provisioning logic and the SSH layer, so flows can be
/// tested against a mock without network I/O
#[async_trait]
pub trait RemoteExecutor: Send {
    /// Connect if needed, run a single command, close the session
    async fn run(&mut self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Upload a local file to the remote path over a dedicated transport
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), ExecError>;
}

#[async_trait]
impl RemoteExecutor for RemoteSession {
    async fn run(&mut self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.connect().await?;
        self.execute(cmd).await
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), ExecError> {
        self.upload_file(local, remote).await
    }
}
