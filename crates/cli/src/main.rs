// SPDX-License-Identifier: MIT

//! `dproc` - minimal driver for the document processor core.
//!
//! This binary exists only to exercise `dproc-daemon` end to end: `run`
//! starts the processor against the local offline source, `submit` drops a
//! document into that source's directory for the next poll to pick up.

use clap::{Parser, Subcommand};
use dproc_daemon::{Config, Processor};
use dproc_registry::PluginRegistry;
use dproc_transport::OfflineSource;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "dproc", version, about = "Document processor core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the processor, polling the local offline source.
    Run,
    /// Drop a document into the offline source's LocalCommandRoot.
    Submit {
        /// Path to a document JSON file; reads stdin if omitted.
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] dproc_daemon::ConfigError),
    #[error("DPROC_OFFLINE_ROOT must be set for this command")]
    MissingOfflineRoot,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run => run().await,
        Command::Submit { file } => submit(file),
    }
}

async fn run() -> Result<(), CliError> {
    let mut config = Config::from_env()?;
    // The offline source doubles as the primary transport here, so it must
    // not also be polled a second time as the processor's secondary source.
    let offline_root = config.offline_root.take().ok_or(CliError::MissingOfflineRoot)?;
    let transport = Arc::new(OfflineSource::new(offline_root)?);
    let registry = Arc::new(PluginRegistry::builder().build());
    let processor = Processor::new(config, transport, registry);

    let shutdown = dproc_core::CancelToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown_for_signal.cancel(dproc_core::CancelReason::ShutDown);
        }
    });

    tracing::info!("processor starting");
    processor.run(shutdown).await;
    tracing::info!("processor stopped");
    Ok(())
}

fn submit(file: Option<PathBuf>) -> Result<(), CliError> {
    let payload = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let offline_root = std::env::var("DPROC_OFFLINE_ROOT").map(PathBuf::from).map_err(|_| CliError::MissingOfflineRoot)?;
    std::fs::create_dir_all(&offline_root)?;
    let dest = offline_root.join(format!("{}.json", dproc_core::DocumentId::new().suffix()));
    std::fs::write(dest, payload)?;
    Ok(())
}
