use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "Encrypted, replicated storage pools", long_about = None)]
#[command(version)]
struct Cli {
    /// Pool configuration file (defaults to $CAIRN_CONFIG, then the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    cairn_utils::tracing::init(cli.verbose).map_err(|e| eyre::eyre!(e))?;

    let mut loader = cairn_config::PoolConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.path(path);
    }
    let config = loader.load()?;
    tracing::debug!(source = ?config.source, locations = config.locations.len(), "Configuration loaded");

    let pool = cairn_pool::StoragePool::from_config(&config)?;
    let outcome = cli.command.execute(&pool).await;
    pool.shutdown()?;
    outcome
}
