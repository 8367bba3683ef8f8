//! Update agent: swap loop run in a separate, short-lived process
//!
//! The parent stages the new artifact, spawns the agent, and exits; the
//! agent replaces the live artifact once the parent's exit has released
//! it, then relaunches the program. The original artifact is never
//! deleted before the new one's digest has been confirmed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument};

use hostforge_core::RetryPolicy;

use crate::digest::file_digest;
use crate::error::UpdateError;
use crate::transaction::{NO_UPDATE_FLAG, UpdateState};

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = OsString::from(path.as_os_str());
    os.push(suffix);
    PathBuf::from(os)
}

/// One attempt at the backup/swap/verify sequence.
///
/// Pure paths in, state machine out; process relaunch is handled by
/// [`run_agent`] so the swap itself is testable in isolation.
#[derive(Debug)]
pub struct SwapPlan {
    live_path: PathBuf,
    staged_path: PathBuf,
    backup_path: PathBuf,
    expected_digest: String,
    state: UpdateState,
}

impl SwapPlan {
    /// Build a plan; the backup path is derived from the live path
    pub fn new(
        live_path: impl Into<PathBuf>,
        staged_path: impl Into<PathBuf>,
        expected_digest: impl Into<String>,
    ) -> Self {
        let live_path = live_path.into();
        let backup_path = with_suffix(&live_path, ".backup");
        Self {
            live_path,
            staged_path: staged_path.into(),
            backup_path,
            expected_digest: expected_digest.into(),
            state: UpdateState::BackingUp,
        }
    }

    /// Current state of the plan
    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Where the previous artifact is parked during the swap
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Execute the swap: confirm the staged artifact, back up the live
    /// one, move the staged artifact into place, re-verify its digest,
    /// restore permissions and drop the backup.
    ///
    /// On a digest mismatch the backup is moved back into place and the
    /// plan ends in `RolledBack`; the error is terminal.
    ///
    /// # Errors
    /// `UpdateError::StagedMissing` and `UpdateError::Io` are retryable by
    /// the agent loop; `UpdateError::Integrity` is not.
    pub async fn execute(&mut self) -> Result<(), UpdateError> {
        self.state = UpdateState::BackingUp;

        if !self.staged_path.exists() {
            return Err(UpdateError::StagedMissing(self.staged_path.clone()));
        }

        if self.live_path.exists() {
            tokio::fs::rename(&self.live_path, &self.backup_path).await?;
            debug!(backup = %self.backup_path.display(), "live artifact backed up");
        } else {
            // First-run case: nothing to back up
            debug!(live = %self.live_path.display(), "no live artifact to back up");
        }

        self.state = UpdateState::Swapping;
        tokio::fs::rename(&self.staged_path, &self.live_path).await?;

        let actual = file_digest(&self.live_path)?;
        if !actual.eq_ignore_ascii_case(&self.expected_digest) {
            error!(
                expected = %self.expected_digest,
                actual = %actual,
                "digest mismatch after swap, rolling back"
            );
            if self.backup_path.exists() {
                tokio::fs::rename(&self.backup_path, &self.live_path).await?;
            }
            self.state = UpdateState::RolledBack;
            return Err(UpdateError::Integrity {
                expected: self.expected_digest.clone(),
                actual,
            });
        }

        restore_executable_bits(&self.live_path)?;

        if self.backup_path.exists() {
            tokio::fs::remove_file(&self.backup_path).await?;
        }

        self.state = UpdateState::Committed;
        info!(live = %self.live_path.display(), "artifact swap committed");
        Ok(())
    }
}

#[cfg(unix)]
fn restore_executable_bits(path: &Path) -> Result<(), UpdateError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn restore_executable_bits(_path: &Path) -> Result<(), UpdateError> {
    Ok(())
}

/// Agent process entry point: retry the swap under the agent policy, then
/// relaunch the live artifact with the forwarded arguments.
///
/// After the retry ceiling the backup is left in place for manual
/// recovery and the error surfaces so the process exits non-zero.
///
/// # Errors
/// Returns the last swap error after exhaustion, a terminal
/// `UpdateError::Integrity`, or `UpdateError::Relaunch`.
#[instrument(skip_all, fields(live = %live_path.as_ref().display()))]
pub async fn run_agent(
    live_path: impl AsRef<Path>,
    staged_path: impl AsRef<Path>,
    expected_digest: &str,
    forward_args: &[String],
) -> Result<(), UpdateError> {
    let live_path = live_path.as_ref();
    let staged_path = staged_path.as_ref();

    let policy = RetryPolicy::AGENT_SWAP;
    let (result, attempts) = policy
        .run(
            async || {
                let mut plan = SwapPlan::new(live_path, staged_path, expected_digest);
                plan.execute().await
            },
            UpdateError::is_retryable,
        )
        .await;

    if let Err(e) = result {
        error!(attempts, error = %e, "swap failed, backup left in place");
        return Err(e);
    }

    relaunch(live_path, forward_args)?;
    info!(attempts, "update applied, program relaunched");
    Ok(())
}

/// Launch a new process from the live artifact, guaranteeing the
/// no-update flag is present so the relaunched instance does not recurse
/// into update-checking
fn relaunch(live_path: &Path, forward_args: &[String]) -> Result<(), UpdateError> {
    let mut args: Vec<String> = forward_args
        .iter()
        .filter(|a| a.as_str() != NO_UPDATE_FLAG)
        .cloned()
        .collect();
    args.push(NO_UPDATE_FLAG.to_string());

    std::process::Command::new(live_path)
        .args(&args)
        .spawn()
        .map_err(|e| UpdateError::Relaunch(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &[u8]) {
        fs::write(path, contents).unwrap();
    }

    fn digest_of(contents: &[u8]) -> String {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), contents).unwrap();
        file_digest(file.path()).unwrap()
    }

    #[tokio::test]
    async fn successful_swap_commits_and_removes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        let staged = dir.path().join("hostforge.new");
        write(&live, b"old release");
        write(&staged, b"new release");

        let mut plan = SwapPlan::new(&live, &staged, digest_of(b"new release"));
        plan.execute().await.unwrap();

        assert_eq!(plan.state(), UpdateState::Committed);
        assert_eq!(fs::read(&live).unwrap(), b"new release");
        assert!(!staged.exists());
        assert!(!plan.backup_path().exists());
    }

    #[tokio::test]
    async fn digest_mismatch_rolls_back_original() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        let staged = dir.path().join("hostforge.new");
        write(&live, b"old release");
        write(&staged, b"corrupted download");

        let mut plan = SwapPlan::new(&live, &staged, digest_of(b"new release"));
        let err = plan.execute().await.unwrap_err();

        assert!(matches!(err, UpdateError::Integrity { .. }));
        assert!(!err.is_retryable());
        assert_eq!(plan.state(), UpdateState::RolledBack);
        assert_eq!(fs::read(&live).unwrap(), b"old release");
        assert!(!plan.backup_path().exists());
    }

    #[tokio::test]
    async fn first_run_without_live_artifact_installs_staged() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        let staged = dir.path().join("hostforge.new");
        write(&staged, b"new release");

        let mut plan = SwapPlan::new(&live, &staged, digest_of(b"new release"));
        plan.execute().await.unwrap();

        assert_eq!(plan.state(), UpdateState::Committed);
        assert_eq!(fs::read(&live).unwrap(), b"new release");
    }

    #[tokio::test]
    async fn missing_staged_artifact_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        write(&live, b"old release");

        let mut plan = SwapPlan::new(&live, dir.path().join("hostforge.new"), "abc");
        let err = plan.execute().await.unwrap_err();

        assert!(matches!(err, UpdateError::StagedMissing(_)));
        assert!(err.is_retryable());
        assert_eq!(fs::read(&live).unwrap(), b"old release");
    }

    #[tokio::test]
    async fn interrupted_swap_recovers_on_rerun() {
        // Simulates an agent crash after the backup move: the next retry
        // attempt sees no staged file, and rollback happens by restoring
        // the backup manually before re-running.
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        let staged = dir.path().join("hostforge.new");
        write(&live, b"old release");
        write(&staged, b"new release");

        // Interrupted attempt: backup done, swap never happened
        let backup = SwapPlan::new(&live, &staged, "ignored");
        fs::rename(&live, backup.backup_path()).unwrap();

        // A fresh plan still finds the staged artifact and completes
        let mut plan = SwapPlan::new(&live, &staged, digest_of(b"new release"));
        plan.execute().await.unwrap();

        assert_eq!(plan.state(), UpdateState::Committed);
        assert_eq!(fs::read(&live).unwrap(), b"new release");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn swap_restores_executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("hostforge");
        let staged = dir.path().join("hostforge.new");
        write(&live, b"old release");
        write(&staged, b"new release");

        let mut plan = SwapPlan::new(&live, &staged, digest_of(b"new release"));
        plan.execute().await.unwrap();

        let mode = fs::metadata(&live).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }
}
