//! SSH session management using the russh crate

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use russh::keys::ssh_key;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, Disconnect, client};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use hostforge_core::RetryPolicy;

use crate::error::ExecError;
use crate::keys::load_private_key;
use crate::result::{CommandResult, ConnectionInfo};

/// SSH client handler for russh
#[derive(Debug)]
struct TrustedHostHandler;

impl client::Handler for TrustedHostHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host keys are registered in known_hosts by HostKeyStore before
        // the first connection attempt; the transport accepts here.
        Ok(true)
    }
}

/// Lifecycle of a single-use session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticated,
    Executing,
    Closed,
    Failed,
}

/// One authenticated remote-execution channel to a host.
///
/// A session performs one connect/execute/close cycle per logical
/// operation; `upload_file` opens its own transport and does not reuse the
/// handle held for command execution.
pub struct RemoteSession {
    conn: ConnectionInfo,
    key_path: PathBuf,
    passphrase: Option<String>,
    retry: RetryPolicy,
    state: SessionState,
    connect_attempts: u32,
    handle: Option<client::Handle<TrustedHostHandler>>,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("conn", &self.conn)
            .field("key_path", &self.key_path)
            .field("state", &self.state)
            .field("connect_attempts", &self.connect_attempts)
            .finish_non_exhaustive()
    }
}

impl RemoteSession {
    /// Create a session targeting `conn`, authenticating with the key at
    /// `key_path` (decrypted with `passphrase` when set)
    pub fn new(
        conn: ConnectionInfo,
        key_path: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            conn,
            key_path: key_path.into(),
            passphrase,
            retry: RetryPolicy::CONNECT,
            state: SessionState::Idle,
            connect_attempts: 0,
            handle: None,
        }
    }

    /// Override the connect retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connection attempts made by the last connect phase
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Open the transport and authenticate.
    ///
    /// Transient connection failures are retried under the session's
    /// retry policy; passphrase and authentication failures surface
    /// immediately with zero retries.
    ///
    /// # Errors
    /// Returns `ExecError::PassphraseRequired`, `AuthenticationFailed` or
    /// `ConnectionFailed` (after exhausting retries).
    #[instrument(skip(self), fields(host = %self.conn.host))]
    pub async fn connect(&mut self) -> Result<(), ExecError> {
        if self.handle.is_some() {
            return Ok(());
        }

        // Key problems are terminal; surface them before any retry loop.
        let key = match load_private_key(&self.key_path, self.passphrase.as_deref()) {
            Ok(key) => Arc::new(key),
            Err(e) => {
                self.state = SessionState::Failed;
                self.connect_attempts = 0;
                return Err(e);
            }
        };

        self.state = SessionState::Connecting;
        info!(
            host = %self.conn.host,
            port = self.conn.port,
            user = %self.conn.user,
            "connecting to SSH"
        );

        let policy = self.retry;
        let conn = self.conn.clone();
        let (result, attempts) = policy
            .run(
                move || Self::try_connect(conn.clone(), Arc::clone(&key)),
                ExecError::is_retryable,
            )
            .await;
        self.connect_attempts = attempts;

        match result {
            Ok(handle) => {
                info!(host = %self.conn.host, attempts, "SSH connected and authenticated");
                self.handle = Some(handle);
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// One transport + authentication attempt
    async fn try_connect(
        conn: ConnectionInfo,
        key: Arc<PrivateKey>,
    ) -> Result<client::Handle<TrustedHostHandler>, ExecError> {
        let config = Arc::new(client::Config::default());

        let mut session = client::connect(config, (&conn.host[..], conn.port), TrustedHostHandler)
            .await
            .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(&conn.user, PrivateKeyWithHashAlg::new(key, hash_alg))
            .await
            .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(
                "public key authentication rejected".to_string(),
            ));
        }

        Ok(session)
    }

    /// Run a single command line, draining both output streams, then close
    /// the session regardless of outcome.
    ///
    /// # Errors
    /// Returns `ExecError::NotConnected` without an established session,
    /// or `ExecError::IoError` on channel failure.
    #[instrument(skip(self, cmd), fields(host = %self.conn.host))]
    pub async fn execute(&mut self, cmd: &str) -> Result<CommandResult, ExecError> {
        let handle = self.handle.as_mut().ok_or(ExecError::NotConnected)?;
        self.state = SessionState::Executing;

        let result = Self::run_command(handle, cmd).await;
        let close_result = self.close().await;

        let output = result?;
        close_result?;
        Ok(output)
    }

    async fn run_command(
        handle: &mut client::Handle<TrustedHostHandler>,
        cmd: &str,
    ) -> Result<CommandResult, ExecError> {
        debug!(command = %cmd, "executing remote command");
        let start = Instant::now();

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = exit_status.cast_signed();
                }
                Some(ChannelMsg::Eof) | None => break,
                _ => {}
            }
        }

        let duration = start.elapsed();
        let result = CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration,
        };

        debug!(
            command = %cmd,
            status = result.status,
            duration = ?duration,
            "remote command completed"
        );
        Ok(result)
    }

    /// Stream a local file to `remote_path` over an SFTP sub-channel.
    ///
    /// Uses its own transport instance, independent of any handle held
    /// for command execution; both the sub-channel and the transport are
    /// closed before returning.
    ///
    /// # Errors
    /// Returns connection/authentication errors from the transport, or
    /// `ExecError::UploadFailed` on transfer failure.
    #[instrument(skip(self), fields(host = %self.conn.host))]
    pub async fn upload_file(
        &mut self,
        local_path: &std::path::Path,
        remote_path: &str,
    ) -> Result<(), ExecError> {
        let key = Arc::new(load_private_key(&self.key_path, self.passphrase.as_deref())?);

        let policy = self.retry;
        let conn = self.conn.clone();
        let (result, attempts) = policy
            .run(
                move || Self::try_connect(conn.clone(), Arc::clone(&key)),
                ExecError::is_retryable,
            )
            .await;
        self.connect_attempts = attempts;
        let mut handle = result?;

        let upload = Self::run_upload(&mut handle, local_path, remote_path).await;

        let _ = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await;

        upload?;
        info!(
            local = %local_path.display(),
            remote = %remote_path,
            "file uploaded"
        );
        Ok(())
    }

    async fn run_upload(
        handle: &mut client::Handle<TrustedHostHandler>,
        local_path: &std::path::Path,
        remote_path: &str,
    ) -> Result<(), ExecError> {
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;

        let sftp = russh_sftp::client::SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;

        let mut local = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        let mut remote = sftp
            .create(remote_path)
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;

        tokio::io::copy(&mut local, &mut remote)
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;
        remote
            .shutdown()
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;

        sftp.close()
            .await
            .map_err(|e| ExecError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    /// Close the session if it is open
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if the disconnect exchange fails.
    pub async fn close(&mut self) -> Result<(), ExecError> {
        if let Some(handle) = self.handle.take() {
            handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn.host, "SSH disconnected");
        }
        self.state = SessionState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> RemoteSession {
        RemoteSession::new(
            ConnectionInfo::new("192.0.2.1", "root"),
            "/nonexistent/id_rsa",
            None,
        )
    }

    #[test]
    fn new_session_is_idle() {
        let session = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn execute_without_connect_fails() {
        let mut session = session();
        let err = session.execute("true").await.unwrap_err();
        assert!(matches!(err, ExecError::NotConnected));
    }

    #[tokio::test]
    async fn connect_with_missing_key_fails_without_retries() {
        let mut session = session();
        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, ExecError::KeyError(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut session = session();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }
}
