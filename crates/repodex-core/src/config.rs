//! Engine configuration.
//!
//! Loaded from `~/.repodex/config.toml` (or an explicit path), then
//! overridden by `REPODEX_*` environment variables. Every field has a
//! default, so an absent file is a valid configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use opendal::Operator;
use opendal::services::{Fs, Memory, S3};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, MemoryCatalog, SqliteCatalog};
use crate::paths;
use crate::reconciler::ReconcileOptions;

/// Where package archives live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Fs {
        root: PathBuf,
        /// Staging directory for atomic writes; must share a volume with `root`.
        #[serde(default)]
        atomic_write_dir: Option<PathBuf>,
    },
    S3 {
        bucket: String,
        endpoint: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        access_key: Option<String>,
        #[serde(default)]
        secret_key: Option<String>,
    },
    Memory,
}

fn default_region() -> String {
    "auto".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Fs {
            root: paths::store_path(),
            atomic_write_dir: Some(paths::tmp_path()),
        }
    }
}

impl StoreConfig {
    /// Build the opendal operator for this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if a path is not valid UTF-8 or the backend rejects
    /// its configuration.
    pub fn operator(&self) -> Result<Operator> {
        let op = match self {
            Self::Fs {
                root,
                atomic_write_dir,
            } => {
                let mut builder = Fs::default();
                builder.root(root.to_str().context("store root is not valid UTF-8")?);
                if let Some(dir) = atomic_write_dir {
                    builder.atomic_write_dir(
                        dir.to_str().context("atomic_write_dir is not valid UTF-8")?,
                    );
                }
                Operator::new(builder)?.finish()
            }
            Self::S3 {
                bucket,
                endpoint,
                region,
                access_key,
                secret_key,
            } => {
                let mut builder = S3::default();
                builder.bucket(bucket);
                builder.endpoint(endpoint);
                builder.region(region);
                if let Some(key) = access_key {
                    builder.access_key_id(key);
                }
                if let Some(secret) = secret_key {
                    builder.secret_access_key(secret);
                }
                Operator::new(builder)?.finish()
            }
            Self::Memory => Operator::new(Memory::default())?.finish(),
        };
        Ok(op)
    }
}

/// Where the catalog lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogConfig {
    Sqlite { path: PathBuf },
    Memory,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: paths::catalog_path(),
        }
    }
}

impl CatalogConfig {
    /// Open the configured catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or opened.
    pub fn open(&self) -> Result<Arc<dyn Catalog>> {
        Ok(match self {
            Self::Sqlite { path } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create catalog directory {}", parent.display())
                    })?;
                }
                Arc::new(
                    SqliteCatalog::open(path)
                        .with_context(|| format!("failed to open catalog {}", path.display()))?,
                )
            }
            Self::Memory => Arc::new(MemoryCatalog::new()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub store: StoreConfig,
    pub catalog: CatalogConfig,
    /// Identity recorded as owner of channels and packages created on
    /// discovery.
    pub owner: Option<String>,
    /// Channels reconciled concurrently by batch passes.
    pub parallel: usize,
    /// Write `noarch/repodata.json` even when a channel has no noarch packages.
    pub noarch_always: bool,
    /// Hash archives when they are first recorded.
    pub compute_sha256: bool,
    /// Accept platform subdirectories outside the known set.
    pub allow_unknown_platforms: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let options = ReconcileOptions::default();
        Self {
            store: StoreConfig::default(),
            catalog: CatalogConfig::default(),
            owner: None,
            parallel: options.parallel,
            noarch_always: options.noarch_always,
            compute_sha256: options.compute_sha256,
            allow_unknown_platforms: false,
        }
    }
}

impl ReconcileConfig {
    /// Load from `path`, or from the default location if `None`, then apply
    /// environment overrides. A missing default file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or if any file or
    /// override is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = paths::config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_with(|key| std::env::var(key).ok())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `REPODEX_*` overrides, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse, or if S3
    /// overrides are incomplete.
    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(bucket) = lookup("REPODEX_S3_BUCKET") {
            let endpoint = lookup("REPODEX_S3_ENDPOINT")
                .context("REPODEX_S3_ENDPOINT must be set with REPODEX_S3_BUCKET")?;
            self.store = StoreConfig::S3 {
                bucket,
                endpoint,
                region: lookup("REPODEX_S3_REGION").unwrap_or_else(default_region),
                access_key: lookup("REPODEX_S3_ACCESS_KEY"),
                secret_key: lookup("REPODEX_S3_SECRET_KEY"),
            };
        } else if let Some(root) = lookup("REPODEX_STORE_ROOT") {
            self.store = StoreConfig::Fs {
                root: PathBuf::from(root),
                atomic_write_dir: None,
            };
        }

        if let Some(path) = lookup("REPODEX_CATALOG_PATH") {
            self.catalog = CatalogConfig::Sqlite {
                path: PathBuf::from(path),
            };
        }
        if let Some(owner) = lookup("REPODEX_OWNER") {
            self.owner = Some(owner);
        }
        if let Some(parallel) = lookup("REPODEX_PARALLEL") {
            self.parallel = parallel
                .parse()
                .with_context(|| format!("REPODEX_PARALLEL is not a number: '{parallel}'"))?;
        }
        Ok(self)
    }

    /// Engine options derived from this configuration.
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            parallel: self.parallel.max(1),
            noarch_always: self.noarch_always,
            compute_sha256: self.compute_sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_document() {
        let config = ReconcileConfig::from_toml_str(
            r#"
            owner = "alice"
            parallel = 8
            noarch_always = false

            [store]
            kind = "s3"
            bucket = "conda"
            endpoint = "https://r2.example.com"

            [catalog]
            kind = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.owner.as_deref(), Some("alice"));
        assert_eq!(config.parallel, 8);
        assert!(!config.noarch_always);
        assert!(config.compute_sha256);
        assert_eq!(config.catalog, CatalogConfig::Memory);
        assert!(matches!(
            config.store,
            StoreConfig::S3 { ref region, ref access_key, .. } if region == "auto" && access_key.is_none()
        ));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ReconcileConfig::from_toml_str("").unwrap();
        assert_eq!(config, ReconcileConfig::default());
        assert_eq!(config.options(), ReconcileOptions::default());
    }

    #[test]
    fn test_unknown_store_kind_rejected() {
        assert!(ReconcileConfig::from_toml_str("[store]\nkind = \"ftp\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("REPODEX_STORE_ROOT", "/srv/channels"),
            ("REPODEX_CATALOG_PATH", "/srv/catalog.db"),
            ("REPODEX_OWNER", "bob"),
            ("REPODEX_PARALLEL", "2"),
        ]
        .into_iter()
        .collect();

        let config = ReconcileConfig::default()
            .apply_env_with(|k| env.get(k).map(ToString::to_string))
            .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Fs {
                root: PathBuf::from("/srv/channels"),
                atomic_write_dir: None
            }
        );
        assert_eq!(
            config.catalog,
            CatalogConfig::Sqlite {
                path: PathBuf::from("/srv/catalog.db")
            }
        );
        assert_eq!(config.owner.as_deref(), Some("bob"));
        assert_eq!(config.options().parallel, 2);
    }

    #[test]
    fn test_s3_override_requires_endpoint() {
        let result = ReconcileConfig::default().apply_env_with(|k| {
            (k == "REPODEX_S3_BUCKET").then(|| "conda".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_parallel_rejected() {
        let result = ReconcileConfig::default()
            .apply_env_with(|k| (k == "REPODEX_PARALLEL").then(|| "many".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_store_operator_builds() {
        assert!(StoreConfig::Memory.operator().is_ok());
    }
}
