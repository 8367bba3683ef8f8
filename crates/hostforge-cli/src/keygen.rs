//! Local SSH keypair generation via the stock OpenSSH tooling

use std::path::{Path, PathBuf};

use eyre::{WrapErr, bail, eyre};
use tokio::process::Command;
use tracing::info;

/// Default private-key location for a resource name (`~/.ssh/<name>`)
///
/// # Errors
/// Fails when the home directory cannot be resolved.
pub fn default_key_path(name: &str) -> eyre::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| eyre!("home directory not found"))?;
    Ok(home.join(".ssh").join(name))
}

/// Generate an RSA-4096 keypair at `key_path`, protected by `passphrase`,
/// and return the public key line for upstream registration.
///
/// # Errors
/// Fails when `ssh-keygen` cannot be spawned, exits non-zero, or the
/// generated public key cannot be read.
pub async fn generate_keypair(
    key_path: &Path,
    passphrase: &str,
    comment: &str,
) -> eyre::Result<String> {
    if let Some(parent) = key_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .wrap_err("creating key directory")?;
    }

    let output = Command::new("ssh-keygen")
        .arg("-t")
        .arg("rsa")
        .arg("-b")
        .arg("4096")
        .arg("-f")
        .arg(key_path)
        .arg("-N")
        .arg(passphrase)
        .arg("-C")
        .arg(comment)
        .output()
        .await
        .wrap_err("spawning ssh-keygen")?;

    if !output.status.success() {
        bail!(
            "ssh-keygen failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    info!(path = %key_path.display(), "generated SSH keypair");

    read_public_key(key_path).await
}

/// Read the public half of a keypair (`<key_path>.pub`)
///
/// # Errors
/// Fails when the `.pub` file is missing or unreadable.
pub async fn read_public_key(key_path: &Path) -> eyre::Result<String> {
    let mut pub_path = key_path.as_os_str().to_os_string();
    pub_path.push(".pub");
    let public_key = tokio::fs::read_to_string(&pub_path)
        .await
        .wrap_err_with(|| format!("reading {}", PathBuf::from(&pub_path).display()))?;
    Ok(public_key.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_and_trims_public_key() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("node-1-ssh");
        tokio::fs::write(dir.path().join("node-1-ssh.pub"), "ssh-rsa AAAA test\n")
            .await
            .unwrap();

        let public_key = read_public_key(&key_path).await.unwrap();
        assert_eq!(public_key, "ssh-rsa AAAA test");
    }

    #[tokio::test]
    async fn missing_public_key_is_an_error() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("absent");
        assert!(read_public_key(&key_path).await.is_err());
    }
}
