//! Update transaction orchestration
//!
//! Runs in the still-live program: version check, staging download,
//! verification, and the hand-off to the agent process. The live artifact
//! is never mutated here; only the agent touches it, after the parent has
//! exited.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::digest::file_digest;
use crate::download::download_artifact;
use crate::error::UpdateError;
use crate::version::VersionDescriptor;

/// Flag appended to relaunch arguments so the new instance skips the
/// update check instead of recursing into it
pub const NO_UPDATE_FLAG: &str = "--no-update";

/// Subcommand under which the agent process runs
pub const UPDATE_AGENT_SUBCOMMAND: &str = "update-agent";

/// Shared lifecycle states of an update, across parent and agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Downloading,
    Verifying,
    BackingUp,
    Swapping,
    Relaunching,
    Committed,
    RolledBack,
    Failed,
}

/// Terminal outcome of one update check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Local artifact already matches the remote descriptor (or the
    /// operator declined the update)
    NoUpdateAvailable,
    /// Agent spawned; the caller must terminate the current process
    UpdatedAndRelaunched,
    /// Update could not be applied; the program continues normally
    UpdateFailed,
}

/// Where to check for and fetch updates
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// URL of the `<version> <hex-digest>` text resource
    pub version_url: String,
    /// URL of the candidate artifact
    pub artifact_url: String,
    /// Version string compiled into the running program
    pub current_version: String,
    /// Path of the running artifact
    pub exe_path: PathBuf,
    /// Original invocation arguments (without argv[0])
    pub invocation_args: Vec<String>,
}

/// One update attempt: staging paths, expected digest, state.
///
/// Owns its staged and backup paths exclusively for its lifetime.
#[derive(Debug)]
pub struct UpdateTransaction {
    current_path: PathBuf,
    staged_path: PathBuf,
    expected_digest: String,
    state: UpdateState,
}

impl UpdateTransaction {
    /// Create a transaction for the artifact at `current_path`; the
    /// staging path is derived from it
    pub fn new(current_path: impl Into<PathBuf>, expected_digest: impl Into<String>) -> Self {
        let current_path = current_path.into();
        let mut staged = OsString::from(current_path.as_os_str());
        staged.push(".new");
        Self {
            current_path,
            staged_path: PathBuf::from(staged),
            expected_digest: expected_digest.into(),
            state: UpdateState::Downloading,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Staging path the candidate artifact is downloaded to
    #[must_use]
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    /// Download the candidate artifact to the staging path
    ///
    /// # Errors
    /// Network and HTTP failures; the transaction moves to `Failed`.
    pub async fn download(
        &mut self,
        client: &reqwest::Client,
        artifact_url: &str,
    ) -> Result<(), UpdateError> {
        self.state = UpdateState::Downloading;
        match download_artifact(client, artifact_url, &self.staged_path).await {
            Ok(_) => {
                self.state = UpdateState::Verifying;
                Ok(())
            }
            Err(e) => {
                self.state = UpdateState::Failed;
                Err(e)
            }
        }
    }

    /// Verify the staged artifact against the expected digest.
    ///
    /// On mismatch the staged file is discarded and the transaction ends
    /// in `RolledBack`; the live artifact is untouched.
    ///
    /// # Errors
    /// `UpdateError::Integrity` on mismatch, `UpdateError::Io` if the
    /// staged file is unreadable.
    pub fn verify_staged(&mut self) -> Result<(), UpdateError> {
        self.state = UpdateState::Verifying;
        let actual = file_digest(&self.staged_path)?;

        if !actual.eq_ignore_ascii_case(&self.expected_digest) {
            if let Err(e) = std::fs::remove_file(&self.staged_path) {
                warn!(error = %e, "failed to discard staged artifact");
            }
            self.state = UpdateState::RolledBack;
            return Err(UpdateError::Integrity {
                expected: self.expected_digest.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Spawn the agent process and mark the transaction committed.
    ///
    /// The agent receives the live path, the staged path, the expected
    /// digest (always — the rollback re-verification depends on it) and
    /// the forwarded arguments. The caller must exit immediately after
    /// this returns so the agent can replace the artifact.
    ///
    /// # Errors
    /// Returns `UpdateError::Relaunch` if the agent cannot be spawned.
    pub fn spawn_agent(&mut self, invocation_args: &[String]) -> Result<(), UpdateError> {
        self.state = UpdateState::Relaunching;
        let forward = build_forward_args(invocation_args);

        std::process::Command::new(&self.current_path)
            .arg(UPDATE_AGENT_SUBCOMMAND)
            .arg(&self.current_path)
            .arg(&self.staged_path)
            .arg(&self.expected_digest)
            .args(&forward)
            .spawn()
            .map_err(|e| {
                self.state = UpdateState::Failed;
                UpdateError::Relaunch(e.to_string())
            })?;

        self.state = UpdateState::Committed;
        Ok(())
    }
}

/// Arguments the relaunched instance will run with: the original
/// invocation stripped of any update flags, with the no-update flag
/// appended exactly once
#[must_use]
pub fn build_forward_args(invocation_args: &[String]) -> Vec<String> {
    let mut forward: Vec<String> = invocation_args
        .iter()
        .filter(|a| a.as_str() != NO_UPDATE_FLAG)
        .cloned()
        .collect();
    forward.push(NO_UPDATE_FLAG.to_string());
    forward
}

/// Check the remote descriptor and, when the operator confirms, stage the
/// new artifact and hand off to the agent.
///
/// A failed network check reports `UpdateFailed` without aborting the
/// host program; the caller proceeds to normal operation. On
/// `UpdatedAndRelaunched` the caller must terminate the process.
#[instrument(skip_all)]
pub async fn run_update_check(
    config: &UpdateConfig,
    confirm: impl FnOnce(&VersionDescriptor) -> bool,
) -> UpdateOutcome {
    let client = reqwest::Client::new();

    let remote = match VersionDescriptor::fetch(&client, &config.version_url).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!(error = %e, "version check failed");
            return UpdateOutcome::UpdateFailed;
        }
    };

    let local_digest = match file_digest(&config.exe_path) {
        Ok(digest) => digest,
        Err(e) => {
            warn!(error = %e, "could not digest running artifact");
            return UpdateOutcome::UpdateFailed;
        }
    };

    if remote.matches(&config.current_version, &local_digest) {
        info!(version = %config.current_version, "already at the latest version");
        return UpdateOutcome::NoUpdateAvailable;
    }

    if !confirm(&remote) {
        info!(version = %remote.version, "update declined by operator");
        return UpdateOutcome::NoUpdateAvailable;
    }

    let mut transaction = UpdateTransaction::new(&config.exe_path, remote.digest.clone());

    if let Err(e) = transaction.download(&client, &config.artifact_url).await {
        warn!(error = %e, "artifact download failed");
        return UpdateOutcome::UpdateFailed;
    }

    if let Err(e) = transaction.verify_staged() {
        warn!(error = %e, "staged artifact rejected");
        return UpdateOutcome::UpdateFailed;
    }

    match transaction.spawn_agent(&config.invocation_args) {
        Ok(()) => {
            info!(version = %remote.version, "agent spawned, exiting for swap");
            UpdateOutcome::UpdatedAndRelaunched
        }
        Err(e) => {
            warn!(error = %e, "failed to spawn update agent");
            UpdateOutcome::UpdateFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn staging_path_is_derived_from_live_path() {
        let transaction = UpdateTransaction::new("/opt/hostforge", "abc123");
        assert_eq!(
            transaction.staged_path(),
            Path::new("/opt/hostforge.new")
        );
        assert_eq!(transaction.state(), UpdateState::Downloading);
    }

    #[test]
    fn verify_accepts_matching_digest() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        fs::write(&live, b"current").unwrap();

        let mut transaction = UpdateTransaction::new(&live, "placeholder");
        fs::write(transaction.staged_path(), b"candidate").unwrap();
        let expected = file_digest(transaction.staged_path()).unwrap();
        transaction.expected_digest = expected;

        transaction.verify_staged().unwrap();
        assert_eq!(transaction.state(), UpdateState::Verifying);
        assert!(transaction.staged_path().exists());
    }

    #[test]
    fn verify_mismatch_discards_staged_and_leaves_live_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        fs::write(&live, b"current release").unwrap();

        let mut transaction = UpdateTransaction::new(&live, "abc123");
        fs::write(transaction.staged_path(), b"corrupted download").unwrap();

        let err = transaction.verify_staged().unwrap_err();

        assert!(matches!(err, UpdateError::Integrity { .. }));
        assert_eq!(transaction.state(), UpdateState::RolledBack);
        assert!(!transaction.staged_path().exists());
        assert_eq!(fs::read(&live).unwrap(), b"current release");
    }

    #[test]
    fn forward_args_strip_and_append_no_update_flag() {
        let args = vec![
            "provision".to_string(),
            "--name".to_string(),
            "node-1".to_string(),
            NO_UPDATE_FLAG.to_string(),
        ];
        let forward = build_forward_args(&args);

        assert_eq!(
            forward,
            vec!["provision", "--name", "node-1", NO_UPDATE_FLAG]
        );
        assert_eq!(
            forward.iter().filter(|a| *a == NO_UPDATE_FLAG).count(),
            1
        );
    }

    #[test]
    fn forward_args_append_flag_when_absent() {
        let forward = build_forward_args(&[]);
        assert_eq!(forward, vec![NO_UPDATE_FLAG]);
    }
}
