//! Private key loading with optional passphrase

use std::path::Path;

use russh::keys::{PrivateKey, load_secret_key};
use tracing::debug;

use crate::error::ExecError;

/// Load and, if needed, decrypt a private key file.
///
/// An encrypted key without a passphrase maps to
/// [`ExecError::PassphraseRequired`]; a supplied passphrase that fails to
/// decrypt maps to [`ExecError::AuthenticationFailed`]. Neither is retried
/// by the connection loop.
///
/// # Errors
/// Returns `ExecError::KeyError` for unreadable or malformed key files.
pub fn load_private_key(path: &Path, passphrase: Option<&str>) -> Result<PrivateKey, ExecError> {
    validate_key_permissions(path)?;
    match load_secret_key(path, passphrase) {
        Ok(key) => {
            debug!(path = %path.display(), "private key loaded");
            Ok(key)
        }
        Err(russh::keys::Error::KeyIsEncrypted) => Err(ExecError::PassphraseRequired),
        Err(e) if passphrase.is_some() => Err(ExecError::AuthenticationFailed(format!(
            "could not decrypt private key: {e}"
        ))),
        Err(e) => Err(ExecError::KeyError(e.to_string())),
    }
}

/// Verify that a key file is not group/world readable (mode 600).
///
/// # Errors
/// Returns `ExecError::KeyError` when permissions are too open or the file
/// cannot be inspected.
#[cfg(unix)]
pub fn validate_key_permissions(path: &Path) -> Result<(), ExecError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| ExecError::KeyError(e.to_string()))?;
    let mode = metadata.permissions().mode();

    if mode & 0o77 != 0 {
        return Err(ExecError::KeyError(format!(
            "key file permissions too open: {} (should be 600)",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn validate_key_permissions(_path: &Path) -> Result<(), ExecError> {
    Ok(())
}
