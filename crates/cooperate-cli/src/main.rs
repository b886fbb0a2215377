//! cooperate CLI: configuration helpers and scripted multi-device runs.

mod simulate;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cooperate_engine::setup;

use crate::simulate::Scenario;

#[derive(Parser)]
#[command(
    name = "cooperate",
    about = "Hand keyboard and mouse between networked devices",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML.
    Config,

    /// Show this device's name and network id, creating the id if needed.
    Id,

    /// Run a scripted scenario between in-process devices.
    Simulate {
        #[arg(value_enum)]
        scenario: Scenario,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = setup::load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.engine.log_level)),
        )
        .init();

    match cli.command {
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            print!("{rendered}");
        }
        Commands::Id => {
            let id = setup::resolve_network_id(&config, &setup::config_dir())?;
            println!("Name:       {}", config.identity.name);
            println!("Network id: {id}");
        }
        Commands::Simulate { scenario } => {
            tracing::info!(?scenario, "running simulation");
            simulate::run(scenario, &config).await?;
        }
    }

    Ok(())
}
