//! siteforge CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a starter config file
//! - `gateway`  — Start the HTTP/WebSocket gateway

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "siteforge",
    about = "siteforge — LLM-driven website builder service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Onboard,

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
    }

    Ok(())
}
