//! Centralized path configuration.

use std::path::PathBuf;

/// Get the stackwire data directory.
///
/// Resolution order:
/// 1. `STACKWIRE_DATA_DIR` environment variable
/// 2. `~/.stackwire`
/// 3. `./.stackwire` when no home directory is known
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STACKWIRE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|h| h.join(".stackwire"))
        .unwrap_or_else(|| PathBuf::from(".stackwire"))
}

/// Get the configuration directory.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STACKWIRE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    data_dir()
}

/// Get the registry database path for an environment.
///
/// Each environment has its own registry so that a `staging` deploy never
/// reads values published by `production`.
pub fn registry_db_path(environment: &str) -> PathBuf {
    data_dir().join("registry").join(format!("{}.db", environment))
}
