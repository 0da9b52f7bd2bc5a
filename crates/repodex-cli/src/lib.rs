//! repodex - package repository reconciliation
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Command-line front end for `repodex-core`: reindex channels from the
//! package store, onboard new channels, and evict catalog rows that no longer
//! match their backing objects.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.repodex/
//! ├── config.toml  # Optional configuration
//! ├── catalog.db   # SQLite catalog
//! ├── store/       # Local package store (<channel>/<platform>/<file>)
//! └── tmp/         # Atomic write staging
//! ```

pub mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repodex_core::ReconcileConfig;
use repodex_schema::Identity;

#[derive(Debug, Parser)]
#[command(name = "repodex")]
#[command(author, version, about = "repodex - package repository reconciliation")]
pub struct Cli {
    /// Configuration file (defaults to ~/.repodex/config.toml)
    #[arg(long, global = true, env = "REPODEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Identity recorded as owner of newly discovered channels and packages
    #[arg(long, global = true)]
    pub owner: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sync one channel from the store and rewrite its indexes
    Reindex {
        /// Channel name
        channel: String,
    },
    /// Reindex every channel in the store
    ReindexAll,
    /// Onboard store channels the catalog does not know yet
    Doorstep,
    /// Evict versions whose backing object is missing or changed
    Validate {
        /// Channel name
        channel: String,
    },
}

/// The owner for this invocation: `--owner`, then the config file.
pub fn resolve_owner(flag: Option<String>, config: &ReconcileConfig) -> Result<Identity> {
    flag.or_else(|| config.owner.clone())
        .map(Identity::new)
        .context("no owner identity: pass --owner or set `owner` in the config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["repodex", "reindex", "main", "--owner", "alice"]);
        assert!(matches!(cli.command, Commands::Reindex { ref channel } if channel == "main"));
        assert_eq!(cli.owner.as_deref(), Some("alice"));

        let cli = Cli::parse_from(["repodex", "--config", "/tmp/r.toml", "reindex-all"]);
        assert!(matches!(cli.command, Commands::ReindexAll));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));

        assert!(Cli::try_parse_from(["repodex", "validate"]).is_err());
    }

    #[test]
    fn test_owner_precedence() {
        let config = ReconcileConfig {
            owner: Some("from-config".to_string()),
            ..ReconcileConfig::default()
        };
        assert_eq!(
            resolve_owner(Some("flag".to_string()), &config).unwrap(),
            Identity::from("flag")
        );
        assert_eq!(
            resolve_owner(None, &config).unwrap(),
            Identity::from("from-config")
        );
        assert!(resolve_owner(None, &ReconcileConfig::default()).is_err());
    }
}
