//! Reindex commands

use anyhow::{Result, bail};
use repodex_core::Reconciler;
use repodex_schema::Identity;
use tokio_util::sync::CancellationToken;

use super::print_batch_tail;

/// Reindex a single channel
pub async fn reindex(reconciler: &Reconciler, channel: &str, owner: &Identity) -> Result<()> {
    let channel = reconciler.reindex(channel, owner).await?;
    println!("  ✓ reindexed {}", channel.name);
    Ok(())
}

/// Reindex every channel in the store, stopping early on `cancel`
pub async fn reindex_all(
    reconciler: &Reconciler,
    owner: &Identity,
    cancel: &CancellationToken,
) -> Result<()> {
    let outcome = reconciler.reindex_all_until(owner, cancel).await?;

    for channel in &outcome.channels {
        println!("  ✓ {}", channel.name);
    }
    print_batch_tail(&outcome.failures, &outcome.cancelled);
    println!(
        "  {} reindexed, {} failed",
        outcome.channels.len(),
        outcome.failures.len()
    );

    if !outcome.failures.is_empty() {
        bail!("{} channel(s) failed to reindex", outcome.failures.len());
    }
    Ok(())
}
