//! Lapwing CLI binary entry point.
//!
//! This binary requires the `cli` feature to be enabled.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lapwing", version, about = "Race-timing coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(lapwing::cli::run::Args),
    Config(lapwing::cli::config::Args),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => lapwing::cli::run::execute(args).await,
        Commands::Config(args) => lapwing::cli::config::execute(args),
    }
}
