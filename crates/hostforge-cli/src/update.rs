//! Release channel wiring for the hostforge binary

use std::io::{self, Write};

use eyre::WrapErr;
use tracing::{info, warn};

use hostforge_update::{UpdateConfig, UpdateOutcome, VersionDescriptor, run_update_check};

const VERSION_URL: &str = "https://raw.githubusercontent.com/hostforge/hostforge/main/versions.txt";
const ARTIFACT_URL: &str =
    "https://github.com/hostforge/hostforge/releases/latest/download/hostforge-x86_64";

/// Update configuration for the running binary
///
/// # Errors
/// Fails when the path of the running executable cannot be resolved.
pub fn update_config() -> eyre::Result<UpdateConfig> {
    Ok(UpdateConfig {
        version_url: VERSION_URL.to_string(),
        artifact_url: ARTIFACT_URL.to_string(),
        current_version: env!("CARGO_PKG_VERSION").to_string(),
        exe_path: std::env::current_exe().wrap_err("resolving current executable")?,
        invocation_args: std::env::args().skip(1).collect(),
    })
}

/// Ask the operator whether to install `remote` now
pub fn confirm_update(remote: &VersionDescriptor) -> bool {
    print!(
        "A new release ({}) is available. Install it now? [y/N] ",
        remote.version
    );
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

/// Run the startup update check. Returns `true` when a new release was
/// staged and the agent spawned, meaning the caller must exit so the
/// artifact can be swapped.
///
/// # Errors
/// Fails only on local environment problems (executable path); network
/// failures degrade to a warning and normal operation.
pub async fn startup_update_check() -> eyre::Result<bool> {
    let config = update_config()?;
    match run_update_check(&config, confirm_update).await {
        UpdateOutcome::UpdatedAndRelaunched => Ok(true),
        UpdateOutcome::NoUpdateAvailable => Ok(false),
        UpdateOutcome::UpdateFailed => {
            warn!("update check failed, continuing with the current release");
            Ok(false)
        }
    }
}

/// Explicit `check-update` command: same flow as the startup check, with
/// the outcome spelled out for the operator.
///
/// The no-update flag suppresses this command too. A relaunch after a
/// successful `check-update` carries the flag in its forwarded arguments,
/// so the new instance reports its version instead of starting another
/// update pass.
///
/// # Errors
/// Same failure modes as [`startup_update_check`].
pub async fn check_update(no_update: bool) -> eyre::Result<()> {
    if no_update {
        println!("Update check disabled; running version {}.", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if startup_update_check().await? {
        info!("update staged, handing off to the agent");
        std::process::exit(0);
    }
    println!("No update applied; running version {}.", env!("CARGO_PKG_VERSION"));
    Ok(())
}
