//! repodex - package repository reconciliation CLI

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use repodex_cli::{Cli, Commands, cmd, resolve_owner};
use repodex_core::{ReconcileConfig, Reconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ReconcileConfig::load(cli.config.as_deref())?;
    let reconciler = Reconciler::from_config(&config)?;

    // Ctrl-C lets in-flight channels finish, then stops the batch.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight channels");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Reindex { channel } => {
            let owner = resolve_owner(cli.owner, &config)?;
            cmd::reindex::reindex(&reconciler, &channel, &owner).await
        }
        Commands::ReindexAll => {
            let owner = resolve_owner(cli.owner, &config)?;
            cmd::reindex::reindex_all(&reconciler, &owner, &cancel).await
        }
        Commands::Doorstep => {
            let owner = resolve_owner(cli.owner, &config)?;
            cmd::doorstep::doorstep(&reconciler, &owner, &cancel).await
        }
        Commands::Validate { channel } => cmd::validate::validate(&reconciler, &channel).await,
    }
}
