//! Node agent setup command synthesis
//!
//! Builds the command chain that installs the constellation node agent on
//! a fresh server. The agent version is resolved from the latest GitHub
//! release, with a pinned fallback when the lookup fails.

use clap::ValueEnum;
use reqwest::Client;
use tracing::{debug, warn};

const RELEASE_API_URL: &str =
    "https://api.github.com/repos/stardustcollective/nodectl/releases/latest";

/// Installed when the release lookup fails
pub const FALLBACK_AGENT_VERSION: &str = "v2.14.1";

/// Target cluster for the node agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Network {
    Mainnet,
    Integrationnet,
    Testnet,
}

impl Network {
    /// Name passed to the agent's `--cluster-config` flag
    #[must_use]
    pub fn cluster_config(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Integrationnet => "integrationnet",
            Network::Testnet => "testnet",
        }
    }

    /// Layer-0 profile name used for the archive seeding step
    #[must_use]
    pub fn profile(self) -> &'static str {
        match self {
            Network::Mainnet | Network::Testnet => "dag-l0",
            Network::Integrationnet => "intnet-l0",
        }
    }
}

/// Resolve the latest published agent release tag, falling back to the
/// pinned version when GitHub is unreachable or answers unexpectedly
pub async fn latest_agent_version(client: &Client) -> String {
    match fetch_latest_tag(client).await {
        Ok(tag) => {
            debug!(tag, "resolved latest agent release");
            tag
        }
        Err(e) => {
            warn!(error = %e, fallback = FALLBACK_AGENT_VERSION, "release lookup failed");
            FALLBACK_AGENT_VERSION.to_string()
        }
    }
}

async fn fetch_latest_tag(client: &Client) -> Result<String, reqwest::Error> {
    let release: serde_json::Value = client
        .get(RELEASE_API_URL)
        .header(reqwest::header::USER_AGENT, "hostforge")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(release["tag_name"]
        .as_str()
        .unwrap_or(FALLBACK_AGENT_VERSION)
        .to_string())
}

/// Build the setup command chain for one node.
///
/// The commands are meant to be joined with `&&` and run in a single
/// remote invocation: download the agent binary, mark it executable,
/// run the quick install (importing the credential bundle when one was
/// uploaded), seed the archive data and upgrade to the latest protocol.
#[must_use]
pub fn setup_commands(
    version: &str,
    node_user: &str,
    network: Network,
    credential_remote_path: Option<&str>,
) -> Vec<String> {
    let mut install = format!(
        "sudo nodectl install --quick-install --user {node_user} --cluster-config {} --confirm",
        network.cluster_config()
    );
    if let Some(path) = credential_remote_path {
        install.push_str(&format!(" --p12-migration-path '{path}'"));
    }

    vec![
        format!(
            "sudo wget -N https://github.com/stardustcollective/nodectl/releases/download/{version}/nodectl_x86_64 -P /usr/local/bin -O /usr/local/bin/nodectl"
        ),
        "sudo chmod +x /usr/local/bin/nodectl".to_string(),
        install,
        format!(
            "sudo nodectl execute_starchiver -p {} --confirm",
            network.profile()
        ),
        "sudo nodectl upgrade --ni".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_without_credential() {
        let commands = setup_commands("v2.14.1", "nodeadmin", Network::Mainnet, None);

        assert_eq!(commands.len(), 5);
        assert!(commands[0].contains("download/v2.14.1/nodectl_x86_64"));
        assert_eq!(commands[1], "sudo chmod +x /usr/local/bin/nodectl");
        assert!(commands[2].contains("--user nodeadmin"));
        assert!(commands[2].contains("--cluster-config mainnet"));
        assert!(!commands[2].contains("--p12-migration-path"));
        assert!(commands[3].contains("-p dag-l0"));
    }

    #[test]
    fn chain_with_credential_adds_migration_path() {
        let commands = setup_commands(
            "v2.14.1",
            "nodeadmin",
            Network::Integrationnet,
            Some("/root/wallet.p12"),
        );

        assert!(commands[2].contains("--p12-migration-path '/root/wallet.p12'"));
        assert!(commands[2].contains("--cluster-config integrationnet"));
        assert!(commands[3].contains("-p intnet-l0"));
    }

    #[test]
    fn testnet_uses_dag_profile() {
        assert_eq!(Network::Testnet.profile(), "dag-l0");
        assert_eq!(Network::Testnet.cluster_config(), "testnet");
    }
}
