//! hostforge: provision and maintain constellation nodes on Hetzner Cloud

mod keygen;
mod provision;
mod server;
mod setup;
mod update;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use eyre::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use hostforge_update::{UPDATE_AGENT_SUBCOMMAND, run_agent};

#[derive(Debug, Parser)]
#[command(name = "hostforge", version, about = "Cloud server provisioning for constellation nodes")]
struct Cli {
    /// Skip the startup update check
    #[arg(long = "no-update", global = true)]
    no_update: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a server, its firewall and SSH key, then install the node agent
    Provision(server::ProvisionArgs),

    /// Check for a new hostforge release and apply it
    CheckUpdate,

    /// Swap a staged artifact into place after the parent process exits
    #[command(name = UPDATE_AGENT_SUBCOMMAND, hide = true)]
    UpdateAgent(AgentArgs),
}

#[derive(Debug, Args)]
struct AgentArgs {
    /// Path of the live artifact to replace
    live_path: PathBuf,

    /// Path of the staged candidate
    staged_path: PathBuf,

    /// Expected hex digest of the staged candidate
    expected_digest: String,

    /// Arguments the relaunched instance runs with
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    forward_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::UpdateAgent(args) => {
            if let Err(e) = run_agent(
                &args.live_path,
                &args.staged_path,
                &args.expected_digest,
                &args.forward_args,
            )
            .await
            {
                error!(error = %e, "artifact swap failed");
                std::process::exit(1);
            }
            return Ok(());
        }
        command => command,
    };

    // CheckUpdate runs its own pass and reports the outcome either way.
    if !cli.no_update
        && !matches!(command, Commands::CheckUpdate)
        && update::startup_update_check().await?
    {
        // The agent now owns the swap; it relaunches us afterwards.
        std::process::exit(0);
    }

    match command {
        Commands::Provision(args) => server::run(args).await,
        Commands::CheckUpdate => update::check_update(cli.no_update).await,
        Commands::UpdateAgent(_) => unreachable!("handled before the update check"),
    }
}
