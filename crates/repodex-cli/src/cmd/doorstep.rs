//! Doorstep command

use anyhow::{Result, bail};
use repodex_core::Reconciler;
use repodex_schema::Identity;
use tokio_util::sync::CancellationToken;

use super::print_batch_tail;

/// Onboard new store channels
pub async fn doorstep(
    reconciler: &Reconciler,
    owner: &Identity,
    cancel: &CancellationToken,
) -> Result<()> {
    let outcome = reconciler.check_doorstep_until(owner, cancel).await?;

    if outcome.onboarded.is_empty() && outcome.failures.is_empty() {
        println!("  no new channels");
        return Ok(());
    }
    for channel in &outcome.onboarded {
        println!("  + {}", channel.name);
    }
    for package in &outcome.packages {
        println!("    {}/{}", package.channel, package.name);
    }
    print_batch_tail(&outcome.failures, &outcome.cancelled);

    if !outcome.failures.is_empty() {
        bail!("{} channel(s) failed to onboard", outcome.failures.len());
    }
    Ok(())
}
