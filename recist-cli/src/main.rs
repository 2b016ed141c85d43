use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use recist_cli::cli::{Cli, Commands};
use recist_cli::commands;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Derive(args) => commands::derive(args),
        Commands::Discordance(args) => commands::discordance(args),
        Commands::Summary(args) => commands::summary(args),
    }
}
