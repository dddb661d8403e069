//! Dripflow — nurture-sequence scheduling and delivery engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dripflow_core::DripflowConfig;
use dripflow_gateway::AppState;
use dripflow_store::Store;

#[derive(Parser)]
#[command(name = "dripflow", about = "Nurture-sequence scheduling and delivery engine")]
struct Cli {
    /// Path to the TOML config file (default: ~/.dripflow/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides config).
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway and the background dispatcher (default).
    Serve,
    /// Run one due-scan pass and exit.
    Tick,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DripflowConfig::load_from(path)?,
        None => DripflowConfig::load()?,
    };
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    let config = Arc::new(config);

    let db_path = config.resolved_db_path();
    let store = Arc::new(Store::open(&db_path, &config.email)?);
    tracing::info!("💾 Store opened at {}", db_path.display());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let dispatcher = dripflow_scheduler::spawn_dispatcher(store.clone(), config.clone());

            dripflow_gateway::serve(AppState { store, config }).await?;
            dispatcher.abort();
        }
        Command::Tick => {
            let attempted =
                dripflow_scheduler::process_due(&store, &config, chrono::Utc::now()).await?;
            tracing::info!("📤 Attempted {attempted} due email(s)");
        }
    }

    Ok(())
}
