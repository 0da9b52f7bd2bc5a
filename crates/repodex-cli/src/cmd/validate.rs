//! Validate command

use anyhow::Result;
use repodex_core::Reconciler;

/// Check a channel's versions against the store and repair drift
pub async fn validate(reconciler: &Reconciler, channel: &str) -> Result<()> {
    let report = reconciler.validate(channel).await?;

    for version in &report.missing {
        println!("  - {} (missing)", version.store_path());
    }
    for version in &report.size_mismatch {
        println!("  - {} (size changed)", version.store_path());
    }
    println!(
        "  checked {}, evicted {}, rewrote {} index(es)",
        report.checked,
        report.repairs(),
        report.reindexed.len()
    );
    Ok(())
}
