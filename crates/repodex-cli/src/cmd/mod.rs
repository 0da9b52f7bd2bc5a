pub mod doorstep;
pub mod reindex;
pub mod validate;

use repodex_core::ChannelFailure;

/// Print per-channel failures and cancellations the way every batch command
/// reports them.
pub(crate) fn print_batch_tail(failures: &[ChannelFailure], cancelled: &[String]) {
    for failure in failures {
        println!("  ✗ {}: {}", failure.channel, failure.error);
    }
    if !cancelled.is_empty() {
        println!("  cancelled before starting: {}", cancelled.join(", "));
    }
}
