//! The `provision` command: create and set up one node end to end

use std::path::{Path, PathBuf};

use clap::Args;
use eyre::{WrapErr, bail, eyre};
use tracing::info;

use hostforge_core::{ApiSession, derive_resource_name, validate_server_name};
use hostforge_exec::{ConnectionInfo, RemoteSession, SystemKnownHosts};
use hostforge_hcloud::{
    CreateServerRequest, HcloudClient, ServerType, all_sources, build_firewall_rules,
    discover_public_ip,
};

use crate::keygen;
use crate::provision::ProvisioningSession;
use crate::setup::{Network, latest_agent_version, setup_commands};

/// Tried in order when no explicit server type is requested
const DEFAULT_SERVER_TYPES: [&str; 2] = ["cx52", "cpx51"];

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Hostname of the new server
    pub name: String,

    /// Cloud API token (64 alphanumeric characters)
    #[arg(long)]
    pub token: String,

    /// Data-center location
    #[arg(long, default_value = "ash")]
    pub location: String,

    /// Server type name; defaults to the first available of cx52, cpx51
    #[arg(long)]
    pub server_type: Option<String>,

    /// OS image
    #[arg(long, default_value = "ubuntu-22.04")]
    pub image: String,

    /// Source address allowed to reach SSH; repeatable. Defaults to the
    /// operator's discovered public IP.
    #[arg(long = "ssh-source")]
    pub ssh_sources: Vec<String>,

    /// Leave SSH open to all sources instead of restricting it
    #[arg(long)]
    pub open_ssh: bool,

    /// Comma-separated node ports (or lo-hi ranges) to open to all
    #[arg(long, default_value = "9000-9001,9010-9011")]
    pub inbound_ports: String,

    /// Target cluster for the node agent
    #[arg(long, value_enum, default_value_t = Network::Mainnet)]
    pub network: Network,

    /// Non-root user the agent installation creates
    #[arg(long, default_value = "nodeadmin")]
    pub node_user: String,

    /// Passphrase for a newly generated SSH key
    #[arg(long)]
    pub key_passphrase: Option<String>,

    /// Local P12 credential bundle to upload and import during install
    #[arg(long)]
    pub credential_bundle: Option<PathBuf>,

    /// Create the server and firewall but skip the remote setup chain
    #[arg(long)]
    pub skip_setup: bool,
}

pub async fn run(args: ProvisionArgs) -> eyre::Result<()> {
    validate_server_name(&args.name)?;

    let session = ApiSession::new(&args.token)?;
    let client = HcloudClient::new(&session)?;
    let http = reqwest::Client::new();

    if !client.server_name_available(&args.name).await? {
        bail!("a server named '{}' already exists", args.name);
    }

    let locations = client.list_locations().await?;
    if !locations.iter().any(|l| l.name == args.location) {
        let available: Vec<&str> = locations.iter().map(|l| l.name.as_str()).collect();
        bail!(
            "unknown location '{}' (available: {})",
            args.location,
            available.join(", ")
        );
    }

    let types = client.list_server_types(&args.location).await?;
    let server_type = pick_server_type(&types, args.server_type.as_deref()).ok_or_else(|| {
        eyre!(
            "no matching server type at '{}' ({} offered)",
            args.location,
            types.len()
        )
    })?;
    info!(
        server_type = %server_type.name,
        cores = server_type.cores,
        "selected server type"
    );

    let ssh_sources = if args.open_ssh {
        all_sources()
    } else if args.ssh_sources.is_empty() {
        let ip = discover_public_ip(&http)
            .await
            .wrap_err("discovering operator public IP")?;
        info!(ip = %ip, "restricting SSH to the discovered operator address");
        vec![ip]
    } else {
        args.ssh_sources.clone()
    };

    let firewall_name = derive_resource_name(&args.name, "-fw");
    let rules = build_firewall_rules(&ssh_sources, &args.inbound_ports);
    let firewall_id = client
        .create_or_update_firewall(&firewall_name, &rules)
        .await?;
    info!(firewall = %firewall_name, id = firewall_id, "firewall in place");

    let key_name = derive_resource_name(&args.name, "-ssh");
    let key_path = keygen::default_key_path(&key_name)?;
    let ssh_key = match client.find_ssh_key(&key_name).await? {
        Some(key) => {
            info!(key = %key_name, "reusing registered SSH key");
            key
        }
        None => {
            let passphrase = args.key_passphrase.clone().unwrap_or_default();
            let public_key = keygen::generate_keypair(&key_path, &passphrase, &key_name).await?;
            client.create_ssh_key(&key_name, &public_key).await?
        }
    };

    let request = CreateServerRequest::new(
        &args.name,
        server_type.id,
        &args.image,
        &args.location,
        firewall_id,
        ssh_key.id,
    );
    let server = client.create_server(&request).await?;
    let ip = server.ipv4().to_string();
    info!(server = %args.name, ip = %ip, "server created");

    let summary = summary_contents(&args.name, &ip, &key_path);
    let summary_path = write_summary(Path::new("."), &args.name, &summary)?;
    println!("Connection details written to {}", summary_path.display());

    if args.skip_setup {
        println!("Setup skipped; connect with: ssh -i {} root@{ip}", key_path.display());
        return Ok(());
    }

    let version = latest_agent_version(&http).await;
    let credential_remote = args
        .credential_bundle
        .as_deref()
        .and_then(Path::file_name)
        .map(|f| format!("/root/{}", f.to_string_lossy()));
    let commands = setup_commands(
        &version,
        &args.node_user,
        args.network,
        credential_remote.as_deref(),
    );

    let executor = RemoteSession::new(
        ConnectionInfo::new(ip.clone(), "root"),
        &key_path,
        args.key_passphrase.clone(),
    );
    let mut provisioning = ProvisioningSession::new(
        ip.clone(),
        Box::new(executor),
        Box::new(SystemKnownHosts::new()?),
    );

    let credential = args.credential_bundle.as_deref().zip(credential_remote);
    let report = provisioning.run(credential, &commands).await?;

    println!("{}", report.output);
    if !report.success() {
        bail!("setup chain exited with status {}", report.status);
    }

    println!(
        "Server '{}' is ready. Connect with: ssh -i {} root@{ip}",
        args.name,
        key_path.display()
    );
    Ok(())
}

/// Choose a server type: the requested one, else the first available of
/// the default preference list, else the largest offered
fn pick_server_type<'a>(
    types: &'a [ServerType],
    requested: Option<&str>,
) -> Option<&'a ServerType> {
    match requested {
        Some(name) => types.iter().find(|t| t.name == name),
        None => DEFAULT_SERVER_TYPES
            .iter()
            .find_map(|preferred| types.iter().find(|t| t.name == *preferred))
            .or_else(|| types.last()),
    }
}

fn summary_contents(name: &str, ip: &str, key_path: &Path) -> String {
    let key = key_path.display();
    let created = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    format!(
        "server:  {name}\n\
         address: {ip}\n\
         key:     {key}\n\
         created: {created}\n\
         \n\
         ssh:  ssh -i {key} root@{ip}\n\
         sftp: sftp -i {key} root@{ip}\n"
    )
}

/// Write the connection summary under `<base>/<name>/<name>_config.txt`
fn write_summary(base: &Path, name: &str, contents: &str) -> eyre::Result<PathBuf> {
    let dir = base.join(name);
    std::fs::create_dir_all(&dir).wrap_err("creating summary directory")?;
    let path = dir.join(format!("{name}_config.txt"));
    std::fs::write(&path, contents).wrap_err("writing connection summary")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_type(name: &str) -> ServerType {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": name,
            "cores": 8,
            "memory": 16.0,
            "disk": 240,
            "architecture": "x86",
            "prices": [{ "location": "ash", "price_monthly": { "net": "30.00" } }]
        }))
        .unwrap()
    }

    #[test]
    fn picks_requested_server_type() {
        let types = vec![server_type("cx42"), server_type("cx52")];
        let picked = pick_server_type(&types, Some("cx42")).unwrap();
        assert_eq!(picked.name, "cx42");
        assert!(pick_server_type(&types, Some("absent")).is_none());
    }

    #[test]
    fn defaults_follow_preference_order() {
        let types = vec![server_type("cpx51"), server_type("cx52")];
        assert_eq!(pick_server_type(&types, None).unwrap().name, "cx52");

        let without_cx52 = vec![server_type("cx22"), server_type("cpx51")];
        assert_eq!(pick_server_type(&without_cx52, None).unwrap().name, "cpx51");
    }

    #[test]
    fn falls_back_to_largest_offered_type() {
        let types = vec![server_type("cax11"), server_type("cax41")];
        assert_eq!(pick_server_type(&types, None).unwrap().name, "cax41");
        assert!(pick_server_type(&[], None).is_none());
    }

    #[test]
    fn summary_lands_in_per_server_directory() {
        let dir = tempfile::tempdir().unwrap();
        let contents = summary_contents("node-1", "203.0.113.5", Path::new("/home/op/.ssh/node-1-ssh"));
        let path = write_summary(dir.path(), "node-1", &contents).unwrap();

        assert!(path.ends_with("node-1/node-1_config.txt"));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("ssh -i /home/op/.ssh/node-1-ssh root@203.0.113.5"));
    }
}
