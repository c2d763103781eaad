//! Nexus selector CLI
//!
//! Read-only views over the selector daemon's report endpoints.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, round, series, servers};

/// Nexus selector CLI
#[derive(Parser)]
#[command(name = "nexusctl")]
#[command(author, version, about = "CLI for the Nexus server selector", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via NEXUS_API_URL env var)
    #[arg(long, env = "NEXUS_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table, or the config file's default_format]
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show forecasts, scores and selection counts per server
    Servers,

    /// Show the latest selection round
    Round,

    /// Show the recorded per-round series for one server
    Series {
        /// Server identifier
        server: String,

        /// Only show the most recent N rounds
        #[arg(long)]
        last: Option<usize>,
    },

    /// Show daemon health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(output::OutputFormat::from_name)
        })
        .unwrap_or_default();

    let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;

    match cli.command {
        Commands::Servers => servers::show_servers(&client, format).await?,
        Commands::Round => round::show_latest_round(&client, format).await?,
        Commands::Series { server, last } => {
            series::show_series(&client, &server, last, format).await?
        }
        Commands::Health => health::show_health(&client, format).await?,
    }

    Ok(())
}
