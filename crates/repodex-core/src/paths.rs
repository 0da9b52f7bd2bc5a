use dirs::home_dir;
use std::path::PathBuf;

/// Returns the repodex home directory, or None if the user's home cannot be resolved.
pub fn try_repodex_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("REPODEX_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".repodex"))
}

/// Returns the repodex home directory (`~/.repodex`), falling back to
/// `./.repodex` when no home directory is available.
pub fn repodex_home() -> PathBuf {
    try_repodex_home().unwrap_or_else(|| PathBuf::from(".repodex"))
}

/// Configuration file: ~/.repodex/config.toml
pub fn config_path() -> PathBuf {
    repodex_home().join("config.toml")
}

/// `SQLite` catalog path: ~/.repodex/catalog.db
pub fn catalog_path() -> PathBuf {
    repodex_home().join("catalog.db")
}

/// Local package store root: ~/.repodex/store
pub fn store_path() -> PathBuf {
    repodex_home().join("store")
}

/// Temp path: ~/.repodex/tmp (same volume as the store, for atomic writes)
pub fn tmp_path() -> PathBuf {
    repodex_home().join("tmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_home() {
        let home = repodex_home();
        assert_eq!(catalog_path().parent(), Some(home.as_path()));
        assert_eq!(store_path(), home.join("store"));
        assert_eq!(tmp_path(), home.join("tmp"));
        assert!(config_path().ends_with("config.toml"));
    }
}
